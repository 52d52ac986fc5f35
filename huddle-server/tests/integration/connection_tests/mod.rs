mod test_ws_heartbeat_timeout;
mod test_ws_join_and_discovery;
