//! # Catalog
//!
//! Sample garments, backdrops and palette colours offered by the studio,
//! plus resolution of scanned garment tags against the catalog.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::StudioError;

/// Palette entry meaning "no colour override".
pub const NO_PALETTE: &str = "None";

/// Categories filled by an automatic curation, one garment each.
pub const CURATED_CATEGORIES: [GarmentCategory; 3] = [
    GarmentCategory::Top,
    GarmentCategory::Bottom,
    GarmentCategory::Shoes,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GarmentCategory {
    Traditional,
    Underwear,
    Top,
    Bottom,
    Dress,
    Outerwear,
    Shoes,
    Accessory,
    Companion,
}

impl GarmentCategory {
    pub const ALL: [GarmentCategory; 9] = [
        GarmentCategory::Traditional,
        GarmentCategory::Underwear,
        GarmentCategory::Top,
        GarmentCategory::Bottom,
        GarmentCategory::Dress,
        GarmentCategory::Outerwear,
        GarmentCategory::Shoes,
        GarmentCategory::Accessory,
        GarmentCategory::Companion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GarmentCategory::Traditional => "Traditional",
            GarmentCategory::Underwear => "Underwear",
            GarmentCategory::Top => "Top",
            GarmentCategory::Bottom => "Bottom",
            GarmentCategory::Dress => "Dress",
            GarmentCategory::Outerwear => "Outerwear",
            GarmentCategory::Shoes => "Shoes",
            GarmentCategory::Accessory => "Accessory",
            GarmentCategory::Companion => "Companion",
        }
    }
}

impl fmt::Display for GarmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for GarmentCategory {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StudioError::validation("category", "unknown garment category", s))
    }
}

/// A catalog garment with its reference photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Garment {
    pub id: String,
    pub name: String,
    pub category: GarmentCategory,
    pub image_url: String,
}

/// A catalog scene to place the subject in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    pub id: String,
    pub name: String,
    pub image_url: String,
}

/// A colour the garments can be recoloured to. `hex` is `None` for the
/// "no override" entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub name: String,
    pub hex: Option<String>,
}

const GARMENTS: &[(&str, &str, GarmentCategory, &str)] = &[
    ("t1", "Banarasi Zari Saree", GarmentCategory::Traditional, "photo-1610030469983-98e6f24965ce"),
    ("t2", "Mirror-Work Lehenga", GarmentCategory::Traditional, "photo-1583391733956-3750e0ff4e8b"),
    ("t3", "Royal Ivory Sherwani", GarmentCategory::Traditional, "photo-1597983073493-88cd35cf93b0"),
    ("t4", "Lucknowi Chikankari Set", GarmentCategory::Traditional, "photo-1574701148212-8518049c7b2c"),
    ("t5", "Emerald Velvet Gown-Saree", GarmentCategory::Traditional, "photo-1617627143750-d86bc21e42bb"),
    ("i1", "Ribbed Silk Bralette", GarmentCategory::Underwear, "photo-1594235412402-9f4902107700"),
    ("i2", "Mesh Sculpt Bodysuit", GarmentCategory::Underwear, "photo-1621335300343-8201b4d5400c"),
    ("g3", "Cashmere Turtleneck", GarmentCategory::Top, "photo-1576566588028-4147f3842f27"),
    ("g16", "Crisp Poplin Shirt", GarmentCategory::Top, "photo-1598033129183-c4f50c717658"),
    ("g4", "Linen Wide-Legs", GarmentCategory::Bottom, "photo-1594633312681-425c7b97ccd1"),
    ("g18", "Pinstripe Pants", GarmentCategory::Bottom, "photo-1506629082925-636bb3c442ca"),
    ("g1", "Silk Evening Gown", GarmentCategory::Dress, "photo-1566174053879-31528523f8ae"),
    ("g8", "Floral Summer Wrap", GarmentCategory::Dress, "photo-1572804013307-a9a11327851d"),
    ("g2", "Structured Blazer", GarmentCategory::Outerwear, "photo-1591047139829-d91aecb6caea"),
    ("g7", "Classic Leather Biker", GarmentCategory::Outerwear, "photo-1551028719-00167b16eac5"),
    ("s1", "Stiletto Heels", GarmentCategory::Shoes, "photo-1543163521-1bf539c55dd2"),
    ("s3", "Chelsea Boots", GarmentCategory::Shoes, "photo-1638247025967-b4e38f787b76"),
    ("a1", "Gold Link Watch", GarmentCategory::Accessory, "photo-1524338198850-8a2ff63aaceb"),
    ("a4", "Crossbody Bag", GarmentCategory::Accessory, "photo-1548036328-c9fa89d128fa"),
    ("c1", "Golden Retriever", GarmentCategory::Companion, "photo-1552053831-71594a27632d"),
];

const BACKGROUNDS: &[(&str, &str, &str)] = &[
    ("b1", "Parisian Street", "photo-1502602898657-3e91760cbb34"),
    ("b2", "Minimalist Studio", "photo-1554118811-1e0d58224f24"),
    ("b3", "Luxury Lounge", "photo-1618221195710-dd6b41faaea6"),
    ("b4", "Art Gallery", "photo-1518998053574-53f026344694"),
    ("b5", "Milan Plaza", "photo-1520175480921-4edfa0683001"),
];

const PALETTE: &[(&str, Option<&str>)] = &[
    (NO_PALETTE, None),
    ("Obsidian Black", Some("#000000")),
    ("Alabaster White", Some("#F2F2F2")),
    ("Bordeaux Red", Some("#6D0E0E")),
    ("Cobalt Blue", Some("#0047AB")),
    ("Sage Green", Some("#9CA986")),
    ("Champagne Gold", Some("#F1E5AC")),
];

fn photo_url(photo: &str, width: u32) -> String {
    format!("https://images.unsplash.com/{photo}?auto=format&fit=crop&q=80&w={width}")
}

pub fn sample_garments() -> Vec<Garment> {
    GARMENTS
        .iter()
        .map(|&(id, name, category, photo)| Garment {
            id: id.to_string(),
            name: name.to_string(),
            category,
            image_url: photo_url(photo, 600),
        })
        .collect()
}

pub fn sample_backgrounds() -> Vec<Background> {
    BACKGROUNDS
        .iter()
        .map(|&(id, name, photo)| Background {
            id: id.to_string(),
            name: name.to_string(),
            image_url: photo_url(photo, 1200),
        })
        .collect()
}

pub fn palette() -> Vec<PaletteColor> {
    PALETTE
        .iter()
        .map(|&(name, hex)| PaletteColor {
            name: name.to_string(),
            hex: hex.map(str::to_string),
        })
        .collect()
}

/// Garments of one category, or all of them for `None`.
pub fn garments_in(category: Option<GarmentCategory>) -> Vec<Garment> {
    sample_garments()
        .into_iter()
        .filter(|garment| category.is_none_or(|c| garment.category == c))
        .collect()
}

/// One random garment per [`CURATED_CATEGORIES`] entry, in that order.
pub fn curate<R: Rng + ?Sized>(rng: &mut R) -> Vec<Garment> {
    CURATED_CATEGORIES
        .into_iter()
        .filter_map(|category| garments_in(Some(category)).choose(rng).cloned())
        .collect()
}

pub fn find_background(id: &str) -> Option<Background> {
    sample_backgrounds().into_iter().find(|bg| bg.id == id)
}

/// Match a scanned tag payload to a garment by exact id or by
/// case-insensitive name.
pub fn resolve_tag(payload: &str) -> Option<Garment> {
    let lowered = payload.to_lowercase();
    sample_garments()
        .into_iter()
        .find(|garment| garment.id == payload || garment.name.to_lowercase() == lowered)
}

/// Map a palette selection to the colour name sent to the generator.
/// The "None" entry and unknown names yield no palette.
pub fn palette_name(selection: &str) -> Option<String> {
    PALETTE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(selection.trim()))
        .filter(|(name, _)| *name != NO_PALETTE)
        .map(|(name, _)| name.to_string())
}
