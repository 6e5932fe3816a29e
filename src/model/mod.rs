//! Declaration model shared by the analyzer, the flattening builder and the
//! code emitter.

pub mod comparison;
pub mod member;
pub mod mockable;
pub mod render;
pub mod types;

pub use comparison::{ClassScope, DeclaredFacts, TypeFacts};
pub use member::{
    Accessor, ComparisonClass, Effects, Member, MemberKind, Parameter, Receiver, ReturnShape,
    Signature,
};
pub use mockable::{AssociatedTypeParam, Conformance, ConformanceKind, FlatMember, MockableType};
pub use render::{render_bound, render_path, render_tokens, render_type};
pub use types::{
    full_path, module_path_string, AssociatedType, Accessibility, GenericKind, GenericParam,
    Generics, Initializer, InitializerOutput, SourceLocation, SuperType, TypeDeclaration,
    TypeKind, TypeRef,
};
