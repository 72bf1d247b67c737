use crate::{
    definition::ResourceDefinition,
    engine::{ListOperations, ListSelector},
    key::Params,
    state::{Metadata, Values},
};

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Send even when an identical request is outstanding
    pub force: bool,
    pub metadata: Metadata,
    /// Metadata stored on every entity received by a list fetch
    pub item_metadata: Metadata,
}

impl FetchOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

/// A list addressed by a membership hint
#[derive(Debug, Clone, PartialEq)]
pub enum ListTarget {
    /// Every list of the resource
    All,
    /// The list addressed by these params
    List(Params),
}

/// List membership changes requested alongside new/create commands
#[derive(Debug, Clone, Default)]
pub struct ListHints {
    pub push: Vec<Params>,
    pub unshift: Vec<Params>,
    pub invalidate: Vec<ListTarget>,
}

impl ListHints {
    pub fn push(mut self, params: impl Into<Params>) -> Self {
        self.push.push(params.into());
        self
    }

    pub fn unshift(mut self, params: impl Into<Params>) -> Self {
        self.unshift.push(params.into());
        self
    }

    pub fn invalidate(mut self, target: ListTarget) -> Self {
        self.invalidate.push(target);
        self
    }

    /// Resolve params into list keys of `definition`
    pub(crate) fn resolve(&self, definition: &ResourceDefinition) -> ListOperations {
        ListOperations {
            push: self
                .push
                .iter()
                .map(|params| definition.list_key(params))
                .collect(),
            unshift: self
                .unshift
                .iter()
                .map(|params| definition.list_key(params))
                .collect(),
            invalidate: self
                .invalidate
                .iter()
                .map(|target| match target {
                    ListTarget::All => ListSelector::All,
                    ListTarget::List(params) => ListSelector::Key(definition.list_key(params)),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewItemOptions {
    pub lists: ListHints,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub force: bool,
    pub metadata: Metadata,
    pub lists: ListHints,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub force: bool,
    pub metadata: Metadata,
    /// Values before the update, used to detach the entity from its previous
    /// owners without scanning
    pub previous_values: Option<Values>,
}

#[derive(Debug, Clone, Default)]
pub struct DestroyOptions {
    pub force: bool,
    /// Values before the destroy, used to find owners without scanning
    pub previous_values: Option<Values>,
}
