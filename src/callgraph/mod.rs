//! Call graph construction for one archive at a time.
//!
//! Per-method extraction lives in `visitor`; whole-archive passes in
//! `hierarchy` and `interfaces` run after every class has been visited.

pub(crate) mod context;
pub(crate) mod edge;
pub(crate) mod hierarchy;
pub(crate) mod index;
pub(crate) mod interfaces;
pub(crate) mod method_ref;
pub(crate) mod patterns;
pub(crate) mod visitor;

#[cfg(test)]
pub(crate) mod fixtures;
