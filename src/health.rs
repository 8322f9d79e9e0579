//! `GET /-/healthz` liveness endpoint. Bypasses authorization.

pub const HEALTHZ_PATH: &str = "/-/healthz";

pub async fn healthz() -> &'static str {
    "OK"
}
