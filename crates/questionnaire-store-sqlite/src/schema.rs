//! SQL schema for the questionnaire SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema generation for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS questionnaires (
    questionnaire_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS questionsets (
    questionset_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    questionnaire_id INTEGER NOT NULL REFERENCES questionnaires(questionnaire_id),
    sortid           INTEGER NOT NULL,
    heading          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    surname     TEXT NOT NULL,
    givenname   TEXT NOT NULL,
    gender      TEXT NOT NULL DEFAULT 'unset',   -- 'unset' | 'male' | 'female'
    email       TEXT,
    language    TEXT NOT NULL DEFAULT 'en',
    nextrun     TEXT,                            -- ISO 8601 date or NULL
    state       TEXT NOT NULL DEFAULT 'active',  -- 'active' | 'inactive'
    formtype    TEXT NOT NULL DEFAULT 'email'    -- 'email' | 'paperform'
);

-- One row per yearly run; never updated once created.
CREATE TABLE IF NOT EXISTS runs (
    run_pk INTEGER PRIMARY KEY AUTOINCREMENT,
    runid  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS runinfos (
    runinfo_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id     INTEGER NOT NULL REFERENCES subjects(subject_id),
    run_pk         INTEGER NOT NULL REFERENCES runs(run_pk),
    random         TEXT NOT NULL,
    created        TEXT NOT NULL,                -- RFC 3339 UTC; store-assigned
    emailcount     INTEGER NOT NULL DEFAULT 0,   -- -1 = suppressed
    emailsent      TEXT,                         -- RFC 3339 UTC or NULL
    lastemailerror TEXT,
    questionset_id INTEGER REFERENCES questionsets(questionset_id),
    UNIQUE (subject_id, run_pk)
);

CREATE INDEX IF NOT EXISTS questionsets_questionnaire_idx ON questionsets(questionnaire_id, sortid);
CREATE INDEX IF NOT EXISTS subjects_due_idx               ON subjects(state, nextrun);
CREATE INDEX IF NOT EXISTS runinfos_questionset_idx       ON runinfos(questionset_id);

PRAGMA user_version = 1;
";
