/// Properties shared by every stored record type
pub mod document_tests;
