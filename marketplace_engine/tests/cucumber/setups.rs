use cucumber::given;

use crate::cucumber::{MarketplaceSystem, MarketplaceWorld};

#[given("a seeded marketplace")]
async fn seeded_marketplace(world: &mut MarketplaceWorld) {
    let system = MarketplaceSystem::new().await;
    world.system = Some(system);
}
