/// The one route the quota guards.
pub async fn hello() -> &'static str {
    "Hello, world!"
}
