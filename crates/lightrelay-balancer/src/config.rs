use std::time::Duration;

use lightrelay_room::IdAlphabet;

/// Load balancer settings.
#[derive(Debug, Clone)]
pub struct BalancerConfig {
    /// Key nodes present in `Authorization`.
    pub auth_key: String,
    /// Interval between health-check sweeps.
    pub ping_rate: Duration,
    /// Bound on every request to a node.
    pub probe_timeout: Duration,
    /// Length of issued room ids.
    pub id_length: usize,
    pub id_alphabet: IdAlphabet,
    /// How long an issued id stays reserved while no node lists it.
    pub id_reservation: Duration,
    /// Re-probe the selected node before handing it to a client.
    pub verify_on_join: bool,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            auth_key: "AuthKey".to_string(),
            ping_rate: Duration::from_millis(10_000),
            probe_timeout: Duration::from_millis(5000),
            id_length: 5,
            id_alphabet: IdAlphabet::Alphanumeric,
            id_reservation: Duration::from_secs(60),
            verify_on_join: false,
        }
    }
}
