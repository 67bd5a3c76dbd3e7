//! Integration tests for end-to-end functionality
//!
//! Tests for:
//! - Calculate, fit, fill and save cycles
//! - JSON sample source input
//! - Engine profiles feeding the airflow fit
