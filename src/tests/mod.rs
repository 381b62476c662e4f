//! Whole-interpreter tests, driven through loaded projects.

mod helpers;

mod entity_tests;
mod procedure_tests;
