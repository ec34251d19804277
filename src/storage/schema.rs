//! Database schema constants.
//!
//! Each constant is a single statement so it can run as one prepared query.

/// SQL schema for creating the jobs table.
pub const CREATE_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id UUID PRIMARY KEY,
    kind VARCHAR(64) NOT NULL,
    status VARCHAR(16) NOT NULL
        CHECK (status IN ('queued', 'running', 'succeeded', 'failed')),
    payload JSONB NOT NULL,
    result JSONB,
    error TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    leased_at TIMESTAMPTZ,
    lease_owner VARCHAR(255),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the ingredients table.
pub const CREATE_INGREDIENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ingredients (
    code VARCHAR(64) PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    stock_quantity INTEGER NOT NULL CHECK (stock_quantity >= 0),
    cost_per_unit DOUBLE PRECISION NOT NULL,
    sensory DOUBLE PRECISION[] NOT NULL,
    tags TEXT[] NOT NULL DEFAULT '{}',
    active BOOLEAN NOT NULL DEFAULT TRUE,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Serves the oldest-queued lookup.
pub const CREATE_JOBS_QUEUE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_jobs_kind_status_created ON jobs(kind, status, created_at)";

/// Serves the stale lease sweep.
pub const CREATE_JOBS_LEASE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_jobs_leased_at ON jobs(leased_at) WHERE status = 'running'";

/// A named schema step, applied at most once per database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Schema steps in application order. Names are permanent once released.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_jobs",
        sql: CREATE_JOBS_TABLE,
    },
    Migration {
        name: "0002_create_ingredients",
        sql: CREATE_INGREDIENTS_TABLE,
    },
    Migration {
        name: "0003_index_jobs_queue",
        sql: CREATE_JOBS_QUEUE_INDEX,
    },
    Migration {
        name: "0004_index_jobs_lease",
        sql: CREATE_JOBS_LEASE_INDEX,
    },
];

/// Table names in the schema.
pub mod tables {
    pub const JOBS: &str = "jobs";
    pub const INGREDIENTS: &str = "ingredients";
}
