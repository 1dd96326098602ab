pub(crate) const MAX_CHANCE_SIDES: u32 = 120;
pub(crate) const DEFAULT_CHANCE_HIT: u32 = 1;
pub(crate) const DEFAULT_CHANCE_SIDES: u32 = 1;
pub(crate) const UNLIMITED_USES: i32 = -1;
pub(crate) const ANY_RELATIONSHIP_AGE: i32 = -1;
pub(crate) const DEFAULT_ATTEMPTS_PER_TURN: u32 = 1;
pub(crate) const DEFAULT_COST_RESOURCE: &str = "PUs";

pub(crate) const RELATIONSHIP_ANY: &str = "any";
pub(crate) const RELATIONSHIP_ANY_ALLIED: &str = "anyAllied";
pub(crate) const RELATIONSHIP_ANY_NEUTRAL: &str = "anyNeutral";
pub(crate) const RELATIONSHIP_ANY_WAR: &str = "anyWar";
