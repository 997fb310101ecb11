//! Scope Resolver - classifies a handle into a scope
//!
//! Classification is by attribute, never by lookup:
//! 1. No handle, or the module handle → ephemeral
//! 2. The reserved global handle → global
//! 3. A connected principal → that principal's scope
//! 4. Anything else → unrecognized
//!
//! Unrecognized handles are routine (stale or disconnected players); callers
//! turn them into zero-value reads and no-op writes.

use super::Scope;
use crate::value::ObjectId;
use crate::world::World;

pub struct ScopeResolver;

impl ScopeResolver {
    /// Classify a handle; `None` means unrecognized
    pub fn classify(world: &dyn World, handle: Option<ObjectId>) -> Option<Scope> {
        match handle {
            None | Some(ObjectId::MODULE) => Some(Scope::Ephemeral),
            Some(ObjectId::GLOBAL) => Some(Scope::Global),
            Some(id) if world.is_principal(id) => Some(Scope::Principal(id)),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;

    #[test]
    fn test_classification() {
        let mut world = MemoryWorld::new();
        let pc = world.connect_principal("bob");
        let area = world.add_area("docks");

        assert_eq!(ScopeResolver::classify(&world, None), Some(Scope::Ephemeral));
        assert_eq!(ScopeResolver::classify(&world, Some(ObjectId::MODULE)), Some(Scope::Ephemeral));
        assert_eq!(ScopeResolver::classify(&world, Some(ObjectId::GLOBAL)), Some(Scope::Global));
        assert_eq!(ScopeResolver::classify(&world, Some(pc)), Some(Scope::Principal(pc)));
        assert_eq!(ScopeResolver::classify(&world, Some(area)), None);
        assert_eq!(ScopeResolver::classify(&world, Some(ObjectId::INVALID)), None);
    }

    #[test]
    fn test_disconnected_principal_is_unrecognized() {
        let mut world = MemoryWorld::new();
        let pc = world.connect_principal("carol");
        world.destroy(pc);
        assert_eq!(ScopeResolver::classify(&world, Some(pc)), None);
    }
}
