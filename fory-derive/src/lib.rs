mod repr;

use proc_macro::TokenStream;

/// Derives `from_repr(discriminant) -> Option<Self>` for a C-like enum with
/// explicit discriminants. Used internally for the wire-level category enums
/// (`TypeId`, `ElementFlags`, ...) where the discriminant byte comes off the
/// wire and must be mapped back to a variant without a big hand-written match.
#[proc_macro_derive(FromRepr)]
pub fn derive_from_repr(input: TokenStream) -> TokenStream {
	repr::derive(input).into()
}
