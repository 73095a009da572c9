//! Cleanup rules: the owner-override protocol, volume rule variants, and the rule chain.

pub mod base;
pub mod delete_on_termination;
pub mod engine;
pub mod old_detached;

#[cfg(test)]
mod test_properties;
