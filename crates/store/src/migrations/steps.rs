//! Released migration steps for the wirelink store schema
//!
//! Step payloads are declarative [`TableDef`] values consumed at execution
//! time. The only step carrying dialect-branched SQL text is the account
//! signature key backfill, where the string-splitting functions differ
//! between engines.

use async_trait::async_trait;
use sqlx::{Any, Transaction};

use crate::dialect::Dialect;
use crate::error::StoreResult;
use crate::migrations::step::{exec, MigrationStep, StepContext};
use crate::schema::{ColumnDef, ColumnType, ForeignKeyDef, TableDef};

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        not_null: false,
        default: None,
    }
}

const fn req(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        not_null: true,
        default: None,
    }
}

const fn req_default(name: &'static str, ty: ColumnType, default: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ty,
        not_null: true,
        default: Some(default),
    }
}

const KEY: ColumnType = ColumnType::Blob {
    exact_len: Some(32),
};
const SIGNATURE: ColumnType = ColumnType::Blob {
    exact_len: Some(64),
};
const RAW_BLOB: ColumnType = ColumnType::Blob { exact_len: None };

const DEVICE_FK: ForeignKeyDef = ForeignKeyDef {
    columns: &["device_id"],
    parent_table: "wirelink_device",
    parent_columns: &["device_id"],
};

const OWNER_FK: ForeignKeyDef = ForeignKeyDef {
    columns: &["our_id"],
    parent_table: "wirelink_device",
    parent_columns: &["device_id"],
};

/// The v1 base schema: the device row plus every child table that hangs
/// off it by device identifier with cascading delete/update.
const BASE_TABLES: [TableDef; 10] = [
    TableDef {
        name: "wirelink_device",
        columns: &[
            col("device_id", ColumnType::VarChar(255)),
            req(
                "registration_id",
                ColumnType::BigInt {
                    max: Some(4294967296),
                },
            ),
            req("noise_key", KEY),
            req("identity_key", KEY),
            req("signed_pre_key", KEY),
            req(
                "signed_pre_key_id",
                ColumnType::Integer {
                    max: Some(16777216),
                },
            ),
            req("signed_pre_key_sig", SIGNATURE),
            req("account_key", RAW_BLOB),
            req("account_cert", RAW_BLOB),
            req("account_sig", SIGNATURE),
            req("device_sig", SIGNATURE),
            req("platform", ColumnType::Text),
            req("business_name", ColumnType::Text),
            req("push_name", ColumnType::Text),
        ],
        primary_key: &["device_id"],
        foreign_key: None,
    },
    TableDef {
        name: "wirelink_identity_keys",
        columns: &[
            col("our_id", ColumnType::VarChar(255)),
            col("their_id", ColumnType::Text),
            req("identity", KEY),
        ],
        primary_key: &["our_id", "their_id"],
        foreign_key: Some(OWNER_FK),
    },
    TableDef {
        name: "wirelink_pre_keys",
        columns: &[
            col("device_id", ColumnType::VarChar(255)),
            col(
                "key_id",
                ColumnType::Integer {
                    max: Some(16777216),
                },
            ),
            req("key", KEY),
            req("uploaded", ColumnType::Boolean),
        ],
        primary_key: &["device_id", "key_id"],
        foreign_key: Some(DEVICE_FK),
    },
    TableDef {
        name: "wirelink_sessions",
        columns: &[
            col("our_id", ColumnType::VarChar(255)),
            col("their_id", ColumnType::Text),
            col("session", RAW_BLOB),
        ],
        primary_key: &["our_id", "their_id"],
        foreign_key: Some(OWNER_FK),
    },
    TableDef {
        name: "wirelink_sender_keys",
        columns: &[
            col("our_id", ColumnType::VarChar(255)),
            col("chat_id", ColumnType::Text),
            col("sender_id", ColumnType::Text),
            req("sender_key", RAW_BLOB),
        ],
        primary_key: &["our_id", "chat_id", "sender_id"],
        foreign_key: Some(OWNER_FK),
    },
    TableDef {
        name: "wirelink_sync_keys",
        columns: &[
            col("device_id", ColumnType::VarChar(255)),
            col("key_id", RAW_BLOB),
            req("key_data", RAW_BLOB),
            req("timestamp", ColumnType::BigInt { max: None }),
            req("fingerprint", RAW_BLOB),
        ],
        primary_key: &["device_id", "key_id"],
        foreign_key: Some(DEVICE_FK),
    },
    TableDef {
        name: "wirelink_app_state_versions",
        columns: &[
            col("device_id", ColumnType::VarChar(255)),
            col("name", ColumnType::VarChar(255)),
            req("version", ColumnType::BigInt { max: None }),
            req(
                "hash",
                ColumnType::Blob {
                    exact_len: Some(128),
                },
            ),
        ],
        primary_key: &["device_id", "name"],
        foreign_key: Some(DEVICE_FK),
    },
    TableDef {
        name: "wirelink_mutation_macs",
        columns: &[
            col("device_id", ColumnType::VarChar(255)),
            col("name", ColumnType::VarChar(255)),
            col("version", ColumnType::BigInt { max: None }),
            col("index_mac", KEY),
            req("value_mac", KEY),
        ],
        primary_key: &["device_id", "name", "version", "index_mac"],
        foreign_key: Some(ForeignKeyDef {
            columns: &["device_id", "name"],
            parent_table: "wirelink_app_state_versions",
            parent_columns: &["device_id", "name"],
        }),
    },
    TableDef {
        name: "wirelink_contacts",
        columns: &[
            col("our_id", ColumnType::VarChar(255)),
            col("their_id", ColumnType::Text),
            col("first_name", ColumnType::Text),
            col("full_name", ColumnType::Text),
            col("push_name", ColumnType::Text),
            col("business_name", ColumnType::Text),
        ],
        primary_key: &["our_id", "their_id"],
        foreign_key: Some(OWNER_FK),
    },
    TableDef {
        name: "wirelink_chat_settings",
        columns: &[
            col("our_id", ColumnType::VarChar(255)),
            col("chat_id", ColumnType::Text),
            req_default("muted_until", ColumnType::BigInt { max: None }, "0"),
            req_default("pinned", ColumnType::Boolean, "FALSE"),
            req_default("archived", ColumnType::Boolean, "FALSE"),
        ],
        primary_key: &["our_id", "chat_id"],
        foreign_key: Some(OWNER_FK),
    },
];

/// v1: create the base key-material and protocol-state schema.
pub struct CreateBaseSchema;

#[async_trait]
impl MigrationStep for CreateBaseSchema {
    fn describe(&self) -> &'static str {
        "create base key store schema"
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, ctx: &StepContext) -> StoreResult<()> {
        for table in &BASE_TABLES {
            exec(tx, &table.create_sql(ctx.dialect)).await?;
        }
        Ok(())
    }
}

const ACCOUNT_SIG_KEY: ColumnDef = col("account_sig_key", KEY);

/// Backfill statements deriving each device's own identity record from the
/// identity-key table. The device's own record is keyed by the user part
/// of the device identifier (everything before the '.') with a trailing
/// '0'; the string functions to build that key differ by dialect.
///
/// The Postgres arm additionally drops devices without a match and locks
/// the column down to NOT NULL, which SQLite's ALTER TABLE cannot express.
pub(crate) fn account_sig_key_backfill(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::Postgres => &[
            "UPDATE wirelink_device SET account_sig_key=(\n\
             \tSELECT identity\n\
             \tFROM wirelink_identity_keys\n\
             \tWHERE our_id=wirelink_device.device_id\n\
             \t  AND their_id=concat(split_part(wirelink_device.device_id, '.', 1), '0')\n\
             )",
            "DELETE FROM wirelink_device WHERE account_sig_key IS NULL",
            "ALTER TABLE wirelink_device ALTER COLUMN account_sig_key SET NOT NULL",
        ],
        Dialect::Sqlite => &[
            "UPDATE wirelink_device SET account_sig_key=(\n\
             \tSELECT identity\n\
             \tFROM wirelink_identity_keys\n\
             \tWHERE our_id=wirelink_device.device_id\n\
             \t  AND their_id=substr(wirelink_device.device_id, 0, instr(wirelink_device.device_id, '.')) || '0'\n\
             )",
        ],
    }
}

/// v2: add the account signature key column and backfill it from each
/// device's own identity record.
pub struct AddAccountSigKey;

#[async_trait]
impl MigrationStep for AddAccountSigKey {
    fn describe(&self) -> &'static str {
        "add account signature key with backfill"
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, ctx: &StepContext) -> StoreResult<()> {
        let add = format!(
            "ALTER TABLE wirelink_device ADD COLUMN {}",
            ACCOUNT_SIG_KEY.sql(ctx.dialect)
        );
        exec(tx, &add).await?;

        for statement in account_sig_key_backfill(ctx.dialect) {
            exec(tx, statement).await?;
        }
        Ok(())
    }
}

const MESSAGE_SECRETS_TABLE: TableDef = TableDef {
    name: "wirelink_message_secrets",
    columns: &[
        col("our_id", ColumnType::VarChar(255)),
        col("chat_id", ColumnType::Text),
        col("sender_id", ColumnType::Text),
        col("message_id", ColumnType::Text),
        req("key", SIGNATURE),
    ],
    primary_key: &[],
    foreign_key: Some(OWNER_FK),
};

/// v3: per-message secret storage.
pub struct CreateMessageSecrets;

#[async_trait]
impl MigrationStep for CreateMessageSecrets {
    fn describe(&self) -> &'static str {
        "create message secrets table"
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, ctx: &StepContext) -> StoreResult<()> {
        exec(tx, &MESSAGE_SECRETS_TABLE.create_sql(ctx.dialect)).await
    }
}

const PRIVACY_TOKENS_TABLE: TableDef = TableDef {
    name: "wirelink_privacy_tokens",
    columns: &[
        col("our_id", ColumnType::Text),
        col("their_id", ColumnType::Text),
        req("token", RAW_BLOB),
        req("timestamp", ColumnType::BigInt { max: None }),
    ],
    primary_key: &["our_id", "their_id"],
    foreign_key: None,
};

/// v4: privacy token storage.
pub struct CreatePrivacyTokens;

#[async_trait]
impl MigrationStep for CreatePrivacyTokens {
    fn describe(&self) -> &'static str {
        "create privacy tokens table"
    }

    async fn apply(&self, tx: &mut Transaction<'_, Any>, ctx: &StepContext) -> StoreResult<()> {
        exec(tx, &PRIVACY_TOKENS_TABLE.create_sql(ctx.dialect)).await
    }
}
