mod resolver_tests;
mod selector_tests;
mod writer_tests;
