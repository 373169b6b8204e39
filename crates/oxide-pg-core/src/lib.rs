//! # oxide-pg-core
//!
//! Query compilation and schema evolution for a Postgres persistence
//! engine.
//!
//! This crate provides:
//! - Static entity metadata ([`schema`]) describing tables, columns and
//!   relations
//! - Typed object queries ([`query`]) built from closures over entity rows
//! - A closed intermediate representation ([`ir`]) built by a tree walk
//! - A translator ([`translate`]) producing command text with `@pN`
//!   parameters
//! - Schema snapshots, structural diffing, change ordering and DDL
//!   rendering ([`migrations`])
//!
//! ## Querying
//!
//! ```rust
//! use oxide_pg_core::query::Query;
//! use oxide_pg_core::schema::{ColumnDescriptor, ColumnKind, DataType, EntityDescriptor};
//! use oxide_pg_core::translate::translate_query;
//!
//! static BOOKS: EntityDescriptor = EntityDescriptor {
//!     schema: "library",
//!     name: "book",
//!     columns: &[
//!         ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
//!         ColumnDescriptor::new("title", ColumnKind::Scalar(DataType::Text)),
//!     ],
//!     indexes: &[],
//! };
//!
//! let query = Query::of(&BOOKS).filter(|b| b.field("title").contains("rust"));
//! let command = translate_query(query.expr()).unwrap();
//! assert_eq!(
//!     command.text,
//!     r#"select a."id", a."title" from "library"."book" a where a."title" like '%' || @p0 || '%'"#
//! );
//! ```
//!
//! ## Schema reconciliation
//!
//! ```rust
//! use oxide_pg_core::migrations::{compare, sort_changes, CodeModelBuilder, PostgresDialect};
//! # use oxide_pg_core::schema::{ColumnDescriptor, ColumnKind, DataType, EntityDescriptor};
//! # static BOOKS: EntityDescriptor = EntityDescriptor {
//! #     schema: "library",
//! #     name: "book",
//! #     columns: &[ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint))],
//! #     indexes: &[],
//! # };
//!
//! let expected = CodeModelBuilder::new().entity(&BOOKS).build("app", "localhost").unwrap();
//! let changes = sort_changes(compare(None, Some(&expected)).unwrap()).unwrap();
//! let sql = PostgresDialect::new().render_all(&changes);
//! assert_eq!(sql[1], r#"create schema "library""#);
//! ```

pub mod command;
pub mod error;
pub mod ir;
pub mod migrations;
pub mod query;
pub mod schema;
pub mod translate;

pub use command::{SqlCommand, SqlValue, ToSqlValue};
pub use error::{SchemaError, TranslationError};
pub use query::{Expr, Query};
pub use schema::{EntityDescriptor, Ident};
