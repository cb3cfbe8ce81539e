//! Integration tests for the modular linkage engine.
//!
//! This test file aggregates all engine component tests.

// Test modules from the engine subdirectory
mod checkpoint_test;
