/// Declares a byte-list newtype over `Bytes` that encodes like `VariableList<u8, Max>`.
///
/// JSON uses `0x` hex, SSZ is transparent and the tree hash root is the list root for `Max`.
#[macro_export]
macro_rules! byte_list {
    (
        $(#[$attr:meta])*
        $vis:vis struct $Name:ident;
        max = $Max:ty;
    ) => {
        $(#[$attr])*
        #[derive(
            Debug,
            Default,
            PartialEq,
            Eq,
            Hash,
            Clone,
            serde::Serialize,
            serde::Deserialize,
            ssz_derive::Encode,
            ssz_derive::Decode,
        )]
        #[serde(transparent)]
        #[ssz(struct_behaviour = "transparent")]
        $vis struct $Name(pub ::alloy_primitives::Bytes);

        impl $Name {
            pub fn max_len() -> usize {
                <$Max as ::lh_types::Unsigned>::to_usize()
            }

            /// Wraps `bytes`, rejecting payloads longer than the list maximum.
            pub fn try_new(bytes: impl Into<::alloy_primitives::Bytes>) -> Result<Self, usize> {
                let bytes = bytes.into();
                if bytes.len() > Self::max_len() {
                    return Err(bytes.len());
                }
                Ok(Self(bytes))
            }
        }

        impl ::core::ops::Deref for $Name {
            type Target = ::alloy_primitives::Bytes;
            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::tree_hash::TreeHash for $Name {
            #[inline]
            fn tree_hash_type() -> ::tree_hash::TreeHashType {
                ::tree_hash::TreeHashType::List
            }

            #[inline]
            fn tree_hash_packed_encoding(&self) -> ::tree_hash::PackedEncoding {
                unreachable!("List should never be packed.")
            }

            #[inline]
            fn tree_hash_packing_factor() -> usize {
                unreachable!("List should never be packed.")
            }

            #[inline]
            fn tree_hash_root(&self) -> ::tree_hash::Hash256 {
                let leaves = Self::max_len().div_ceil(::tree_hash::HASHSIZE);
                let root = ::tree_hash::merkle_root(self.0.as_ref(), leaves);
                ::tree_hash::mix_in_length(&root, self.0.len())
            }
        }

        impl ::core::fmt::Display for $Name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
