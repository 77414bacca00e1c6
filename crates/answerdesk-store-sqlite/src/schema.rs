//! SQL schema for the answerdesk SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS tenants (
    tenant_id             TEXT PRIMARY KEY,
    name                  TEXT NOT NULL,
    email                 TEXT NOT NULL,
    website_key           TEXT NOT NULL UNIQUE,
    plan                  TEXT NOT NULL DEFAULT 'trial',
    subscription_start    TEXT NOT NULL,
    subscription_end      TEXT NOT NULL,
    questions_used        INTEGER NOT NULL DEFAULT 0 CHECK (questions_used >= 0),
    questions_allowed     INTEGER NOT NULL,
    hits_used             INTEGER NOT NULL DEFAULT 0 CHECK (hits_used >= 0),
    hits_allowed          INTEGER NOT NULL,
    modifications_used    INTEGER NOT NULL DEFAULT 0 CHECK (modifications_used >= 0),
    modifications_allowed INTEGER NOT NULL,
    is_active             INTEGER NOT NULL DEFAULT 1,
    created_at            TEXT NOT NULL
);

-- `seq` fixes corpus order; matching breaks score ties by it.
CREATE TABLE IF NOT EXISTS entries (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id     TEXT NOT NULL UNIQUE,
    tenant_id    TEXT NOT NULL REFERENCES tenants(tenant_id),
    question     TEXT NOT NULL,
    question_key TEXT NOT NULL,   -- trimmed, case-folded question
    answer       TEXT NOT NULL,
    provenance   TEXT NOT NULL DEFAULT '{\"kind\":\"admin\"}',
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- question_id is NULL for unmatched visitor questions. No foreign key:
-- rows outlive the entries they were bound to until explicitly unbound.
CREATE TABLE IF NOT EXISTS question_stats (
    stats_id      TEXT PRIMARY KEY,
    tenant_id     TEXT NOT NULL REFERENCES tenants(tenant_id),
    question_id   TEXT,
    question_text TEXT NOT NULL,
    count         INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS modification_requests (
    request_id        TEXT PRIMARY KEY,
    tenant_id         TEXT NOT NULL REFERENCES tenants(tenant_id),
    request_type      TEXT NOT NULL,   -- 'add' | 'modify' | 'delete'
    target_entry_id   TEXT,
    proposed_question TEXT,
    proposed_answer   TEXT,
    status            TEXT NOT NULL DEFAULT 'pending',
    admin_notes       TEXT,
    snapshot          TEXT,            -- JSON Snapshot, set on approval
    was_reverted      INTEGER NOT NULL DEFAULT 0,
    reverted_at       TEXT,
    submitted_by      TEXT NOT NULL,
    submitted_role    TEXT NOT NULL,
    decided_by        TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id    TEXT NOT NULL,
    role            TEXT NOT NULL,
    title           TEXT NOT NULL,
    message         TEXT NOT NULL,
    kind            TEXT NOT NULL,
    payload         TEXT NOT NULL DEFAULT '{}',
    is_read         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

-- Append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id    TEXT PRIMARY KEY,
    actor       TEXT NOT NULL,
    action      TEXT NOT NULL,
    tenant_id   TEXT,
    details     TEXT NOT NULL DEFAULT '{}',
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS entries_tenant_idx  ON entries(tenant_id, seq);
CREATE INDEX IF NOT EXISTS entries_key_idx     ON entries(tenant_id, question_key);
CREATE UNIQUE INDEX IF NOT EXISTS stats_bound_idx
    ON question_stats(tenant_id, question_id) WHERE question_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS stats_unbound_idx
    ON question_stats(tenant_id, question_text) WHERE question_id IS NULL;
CREATE INDEX IF NOT EXISTS requests_status_idx ON modification_requests(tenant_id, status);
CREATE INDEX IF NOT EXISTS notifications_inbox_idx ON notifications(recipient_id, is_read);
CREATE INDEX IF NOT EXISTS audit_recorded_idx  ON audit_log(recorded_at);

PRAGMA user_version = 1;
";
