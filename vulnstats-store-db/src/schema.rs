// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Database schema definitions.
//!
//! Every `traversal_ids` column holds the big-endian key produced by
//! `TraversalPath::key`, so BLOB comparison is array comparison.

/// Namespace tree and the raw per-namespace statistics written by ingestion.
pub const SOURCE_SCHEMA_SQL: &str = r#"
create table if not exists namespaces (
    id            integer primary key not null,
    parent_id     integer,
    type          text not null check (type in ('Group', 'Project')),
    traversal_ids blob not null,
    deleted_at    integer,
    foreign key (parent_id) references namespaces(id)
);

create index if not exists index_namespaces_on_traversal_ids on namespaces(traversal_ids);

create table if not exists vulnerability_statistics (
    namespace_id  integer primary key not null,
    traversal_ids blob not null,
    archived      integer not null default 0,
    total         integer not null default 0,
    critical      integer not null default 0,
    high          integer not null default 0,
    medium        integer not null default 0,
    low           integer not null default 0,
    unknown       integer not null default 0,
    info          integer not null default 0,
    updated_at    integer not null
);

create index if not exists index_vulnerability_statistics_on_traversal_ids
    on vulnerability_statistics(traversal_ids) where archived = 0;
"#;

/// Rollups maintained by this crate, plus the lease table guarding moves.
pub const ROLLUP_SCHEMA_SQL: &str = r#"
create table if not exists vulnerability_namespace_statistics (
    id            integer primary key autoincrement not null,
    namespace_id  integer unique not null,
    traversal_ids blob not null,
    total         integer not null default 0,
    critical      integer not null default 0,
    high          integer not null default 0,
    medium        integer not null default 0,
    low           integer not null default 0,
    unknown       integer not null default 0,
    info          integer not null default 0,
    created_at    integer not null,
    updated_at    integer not null
);

create index if not exists index_vulnerability_namespace_statistics_on_traversal_ids
    on vulnerability_namespace_statistics(traversal_ids);

create table if not exists exclusive_leases (
    key        text primary key not null,
    uuid       text not null,
    expires_at integer not null
);
"#;

/// Column list shared by the statistics tables, in `StatisticField::ALL` order.
pub(crate) const COUNT_COLUMNS: &str = "total, critical, high, medium, low, unknown, info";

/// Schema version
pub const SCHEMA_VERSION: i32 = 1;
