mod test_candidate_buffering;
mod test_failures_close_negotiator;
