use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use rkyv::{Archive, Deserialize, Serialize};

use crate::digest::ProductDigest;
use crate::error::{Result, StevedoreError};
use crate::manifest::{Manifest, SlotState, SlotValue, StoredResult};
use crate::paths::path_str;
use crate::product::Product;
use crate::value::Value;

/// Current version of the manifest format.
///
/// This version is incremented when incompatible changes are made to the
/// record layout. A manifest with a higher version is refused instead of
/// being misread.
pub const MANIFEST_VERSION: u32 = 1;

/// On-disk form of a [`Product`].
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ProductRecord {
    /// Absolute source path; must be valid UTF-8.
    #[rkyv(with = rkyv::with::AsString)]
    pub src: PathBuf,
    pub dst: String,
    pub meta: BTreeMap<String, Value>,
}

/// On-disk form of a [`ProductDigest`].
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DigestRecord {
    pub product: ProductRecord,
    /// Stored as nanoseconds since UNIX_EPOCH.
    pub mtime_nanos: u128,
    pub size: u64,
    /// Hex-encoded BLAKE3 hash.
    pub hash: String,
}

/// The bound value of one argument slot, tagged by slot kind.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum SlotValueRecord {
    Product(ProductRecord),
    Products(Vec<ProductRecord>),
    IncrementalProducts(Vec<ProductRecord>),
    Option(Value),
}

#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SlotRecord {
    pub value: SlotValueRecord,
    /// One digest for a single product, one per product for lists, none for
    /// options.
    pub digests: Vec<DigestRecord>,
}

#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub products: Vec<ProductRecord>,
    pub digests: Vec<DigestRecord>,
}

/// The root record written to `<job_dir>/.manifest`.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ManifestRecord {
    pub version: u32,
    pub slots: BTreeMap<String, SlotRecord>,
    pub result: Option<ResultRecord>,
    pub meta: BTreeMap<String, Value>,
}

impl ProductRecord {
    pub fn from_product(product: &Product) -> Result<Self> {
        Ok(Self {
            src: PathBuf::from(path_str(product.src())?),
            dst: product.dst().to_string(),
            meta: product.meta().clone(),
        })
    }

    pub fn to_product(&self) -> Product {
        Product::from_parts(self.src.clone(), self.dst.clone(), Arc::new(self.meta.clone()))
    }
}

impl DigestRecord {
    pub fn from_digest(digest: &ProductDigest) -> Result<Self> {
        Ok(Self {
            product: ProductRecord::from_product(digest.product())?,
            mtime_nanos: digest.mtime_nanos(),
            size: digest.size(),
            hash: digest.hash().to_string(),
        })
    }

    pub fn to_digest(&self) -> ProductDigest {
        ProductDigest::from_parts(
            self.product.to_product(),
            self.mtime_nanos,
            self.size,
            self.hash.clone(),
        )
    }
}

fn products_to_records(products: &[Product]) -> Result<Vec<ProductRecord>> {
    products.iter().map(ProductRecord::from_product).collect()
}

fn digests_to_records(digests: &[ProductDigest]) -> Result<Vec<DigestRecord>> {
    digests.iter().map(DigestRecord::from_digest).collect()
}

fn records_to_products(records: &[ProductRecord]) -> Vec<Product> {
    records.iter().map(ProductRecord::to_product).collect()
}

fn records_to_digests(records: &[DigestRecord]) -> Vec<ProductDigest> {
    records.iter().map(DigestRecord::to_digest).collect()
}

impl SlotValueRecord {
    fn from_value(value: &SlotValue) -> Result<Self> {
        Ok(match value {
            SlotValue::Product(product) => Self::Product(ProductRecord::from_product(product)?),
            SlotValue::Products(products) => Self::Products(products_to_records(products)?),
            SlotValue::IncrementalProducts(products) => {
                Self::IncrementalProducts(products_to_records(products)?)
            }
            SlotValue::Option(value) => Self::Option(value.clone()),
        })
    }

    fn to_value(&self) -> SlotValue {
        match self {
            Self::Product(record) => SlotValue::Product(record.to_product()),
            Self::Products(records) => SlotValue::Products(records_to_products(records)),
            Self::IncrementalProducts(records) => {
                SlotValue::IncrementalProducts(records_to_products(records))
            }
            Self::Option(value) => SlotValue::Option(value.clone()),
        }
    }
}

impl ManifestRecord {
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let slots: BTreeMap<String, SlotRecord> = manifest
            .slots
            .iter()
            .map(|(name, slot)| {
                Ok((
                    name.clone(),
                    SlotRecord {
                        value: SlotValueRecord::from_value(&slot.value)?,
                        digests: digests_to_records(&slot.digests)?,
                    },
                ))
            })
            .collect::<Result<_>>()?;

        let result = manifest
            .result
            .as_ref()
            .map(|result| {
                Ok::<_, StevedoreError>(ResultRecord {
                    products: products_to_records(&result.products)?,
                    digests: digests_to_records(&result.digests)?,
                })
            })
            .transpose()?;

        Ok(Self {
            version: MANIFEST_VERSION,
            slots,
            result,
            meta: manifest.meta.clone(),
        })
    }

    pub(super) fn into_parts(
        self,
    ) -> (
        BTreeMap<String, SlotState>,
        Option<StoredResult>,
        BTreeMap<String, Value>,
    ) {
        let slots = self
            .slots
            .into_iter()
            .map(|(name, record)| {
                let slot = SlotState {
                    value: record.value.to_value(),
                    digests: records_to_digests(&record.digests),
                };
                (name, slot)
            })
            .collect();

        let result = self.result.map(|record| StoredResult {
            products: records_to_products(&record.products),
            digests: records_to_digests(&record.digests),
        });

        (slots, result, self.meta)
    }
}
