//! `leadstock-catalog` — product catalog domain model.
//!
//! A "product" here is a company lead: descriptive company attributes used as
//! reservation filter dimensions, plus the mutable availability state that the
//! reservation engine drives (`holder` / `reserved_until` / `sold_until`).

pub mod filter;
pub mod product;

pub use filter::{ProductFilter, category_prefix};
pub use product::{Availability, Product, ProductId};
