mod common;

mod test_concurrency;
mod test_memory_store;
