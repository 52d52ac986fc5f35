mod test_end_is_idempotent;
mod test_teardown_does_not_block_others;
