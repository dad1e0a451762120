/// Implemented by any config section that needs post-parse checks beyond
/// what `serde`'s `Deserialize` already enforces (e.g. non-empty DSNs,
/// positive durations). `cli::Config::validate` calls this on every
/// section it owns.
pub trait Validatable {
    fn validate(&mut self) -> anyhow::Result<()>;
}
