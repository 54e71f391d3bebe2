mod checker_tests;
mod support;
mod walker_tests;
