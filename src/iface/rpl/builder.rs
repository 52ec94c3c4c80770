use crate::rand::Rand;
use crate::time::Duration;

use super::consts;

/// Configuration of the routing control engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RplConfig {
    pub(super) dio_base: Duration,
    pub(super) dao_base: Duration,
    pub(super) jitter_mask: u16,
    pub(super) send_divider: u8,
    pub(super) prefix_lifetime: u32,
    pub(super) path_lifetime: u8,
    pub(super) dio_instance_id: u8,
    pub(super) dao_instance_id: u8,
    pub(super) initial_dodag_id: Option<[u8; 16]>,
}

impl Default for RplConfig {
    fn default() -> Self {
        Self {
            dio_base: Duration::from_millis(consts::DEFAULT_DIO_BASE_MS),
            dao_base: Duration::from_millis(consts::DEFAULT_DAO_BASE_MS),
            jitter_mask: consts::DEFAULT_JITTER_MASK,
            send_divider: consts::DEFAULT_SEND_DIVIDER,
            prefix_lifetime: consts::DEFAULT_ROUTE_LIFETIME,
            path_lifetime: consts::DEFAULT_PATH_LIFETIME,
            dio_instance_id: consts::DEFAULT_DIO_INSTANCE_ID,
            dao_instance_id: consts::DEFAULT_DAO_INSTANCE_ID,
            initial_dodag_id: None,
        }
    }
}

impl RplConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base DIO timer period.
    #[inline]
    pub fn set_dio_base(mut self, base: Duration) -> Self {
        self.dio_base = base;
        self
    }

    /// Set the base DAO timer period.
    #[inline]
    pub fn set_dao_base(mut self, base: Duration) -> Self {
        self.dao_base = base;
        self
    }

    /// Set how many timer expiries make one announcement. Zero is treated as one.
    #[inline]
    pub fn set_send_divider(mut self, divider: u8) -> Self {
        self.send_divider = divider.max(1);
        self
    }

    /// Set the mask applied to the random jitter, in milliseconds.
    #[inline]
    pub fn set_jitter_mask(mut self, mask: u16) -> Self {
        self.jitter_mask = mask;
        self
    }

    /// Set the route lifetime advertised in the DIO prefix option.
    #[inline]
    pub fn set_prefix_lifetime(mut self, lifetime: u32) -> Self {
        self.prefix_lifetime = lifetime;
        self
    }

    #[inline]
    pub fn set_path_lifetime(mut self, lifetime: u8) -> Self {
        self.path_lifetime = lifetime;
        self
    }

    /// Set the instance IDs written into DIOs and DAOs.
    #[inline]
    pub fn set_instance_ids(mut self, dio: u8, dao: u8) -> Self {
        self.dio_instance_id = dio;
        self.dao_instance_id = dao;
        self
    }

    /// Start with a known DODAGID instead of the placeholder, as a DODAG root does.
    #[inline]
    pub fn set_initial_dodag_id(mut self, dodag_id: [u8; 16]) -> Self {
        self.initial_dodag_id = Some(dodag_id);
        self
    }

    pub fn dio_base(&self) -> Duration {
        self.dio_base
    }

    pub fn dao_base(&self) -> Duration {
        self.dao_base
    }

    pub fn jitter_mask(&self) -> u16 {
        self.jitter_mask
    }

    pub fn initial_dodag_id(&self) -> Option<[u8; 16]> {
        self.initial_dodag_id
    }

    /// Draw a DIO period.
    pub(super) fn dio_period(&self, rand: &mut Rand) -> Duration {
        self.dio_base + self.jitter(rand)
    }

    /// Draw a DAO period.
    pub(super) fn dao_period(&self, rand: &mut Rand) -> Duration {
        self.dao_base + self.jitter(rand)
    }

    fn jitter(&self, rand: &mut Rand) -> Duration {
        Duration::from_millis((rand.rand_u16() & self.jitter_mask) as u64)
    }
}
