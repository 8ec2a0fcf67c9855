// Per-symbol feed loop and its warmup
pub mod live_feed;
pub mod warmup_service;
