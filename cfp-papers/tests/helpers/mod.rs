//! Test Helper Utilities
//!
//! Shared utilities for testing cfp-papers

#![allow(dead_code)]

pub mod assertions;
pub mod db_utils;
pub mod requests;

// Re-export commonly used items
pub use assertions::{
    assert_change_list, assert_int_list_eq, assert_message_fields, assert_paper_status,
    assert_search_ids, expand_int_list,
};
pub use db_utils::{create_test_db, load_fixture_papers, reset_db, test_config, TestDb};
pub use requests::{
    extract_json, form_request, get_request, json_request, make_zip, multipart_request,
    zip_request,
};
