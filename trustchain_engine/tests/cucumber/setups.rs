use cucumber::given;

use crate::{cucumber::EscrowWorld, support::TestSystem};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut EscrowWorld) {
    let system = TestSystem::new().await;
    world.system = Some(system);
}
