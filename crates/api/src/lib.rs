//! HTTP ingress: accepts job envelopes and hands them to the job queue.

pub mod app;
