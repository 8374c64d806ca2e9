//! Test modules for commit-reviewer
//!
//! Unit tests live next to the code they cover; these exercise the HTTP
//! clients against mock servers and the review pipeline end to end.

#[cfg(test)]
pub mod openai_tests;
