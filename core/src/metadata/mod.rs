//! Entity/relationship metadata: descriptors, masking rules and the registry.

mod descriptor;
mod masking;
mod registry;

pub use descriptor::{
    Cardinality, ColumnAttribute, ColumnDescriptor, EntityDescriptor, EntityDescriptorBuilder,
    FkSide, NavigationDescriptor,
};
pub use masking::{Mask, MaskingRule};
pub use registry::{MetadataProvider, MetadataRegistry, NavigationCache};
