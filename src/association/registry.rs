use super::AssociationDescriptor;

/// Association descriptors registered by resource name. Lookups happen when
/// a transition is applied, so descriptors may be declared before or after
/// either resource exists.
#[derive(Debug, Clone, Default)]
pub struct AssociationRegistry {
    descriptors: Vec<AssociationDescriptor>,
}

impl AssociationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; registering the same descriptor twice is a no-op
    pub fn register(&mut self, descriptor: AssociationDescriptor) {
        if self.descriptors.contains(&descriptor) {
            tracing::debug!(
                "Association {} -> {} already registered",
                descriptor.owner,
                descriptor.associated
            );
            return;
        }
        self.descriptors.push(descriptor);
    }

    /// Descriptors driven by lifecycle events of `associated`
    pub fn for_associated<'a>(
        &'a self,
        associated: &'a str,
    ) -> impl Iterator<Item = &'a AssociationDescriptor> + 'a {
        self.descriptors
            .iter()
            .filter(move |descriptor| descriptor.associated == associated)
    }

    /// Descriptors declared on `owner`
    pub fn for_owner<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a AssociationDescriptor> + 'a {
        self.descriptors
            .iter()
            .filter(move |descriptor| descriptor.owner == owner)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_either_side() {
        let mut registry = AssociationRegistry::new();
        registry.register(AssociationDescriptor::has_one("users", "addresses"));
        registry.register(AssociationDescriptor::has_many("users", "posts"));
        registry.register(AssociationDescriptor::has_one("users", "addresses"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.for_associated("addresses").count(), 1);
        assert_eq!(registry.for_associated("users").count(), 0);
        assert_eq!(registry.for_owner("users").count(), 2);
    }
}
