//! Property-based tests for response recovery
