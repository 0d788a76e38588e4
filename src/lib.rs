//! Schema-specialized JSON encoding.
//!
//! A [`Schema`] is compiled once into an encoding [`plan::Plan`] (field order,
//! optional-field bookkeeping, folded literals, array strategies), the plan is
//! bound into closures, and the resulting [`Accelerator`] writes conforming
//! values straight to JSON text without inspecting their types per value.
//!
//! ```
//! use schema_accel::{create_accelerator, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::object([
//!     ("name", Schema::string()),
//!     ("age", Schema::number().optional()),
//! ]);
//! let accel = create_accelerator(&schema);
//! assert_eq!(accel.encode_json(&json!({"name": "Ada"})), r#"{"name":"Ada"}"#);
//! ```
pub mod accelerator;
pub mod backend;
pub mod compiler;
pub mod error;
pub mod load;
pub mod normalize;
pub mod plan;
pub mod schema;
pub mod text;
pub mod value;
mod path_de;

pub use accelerator::{
    create_accelerator, create_accelerator_with, Accelerator, AcceleratorCache, AcceleratorOptions,
};
pub use error::SchemaError;
pub use schema::{ObjectSchema, Schema, SchemaKind};
pub use text::StringEscape;
pub use value::{to_json_string, Value};
