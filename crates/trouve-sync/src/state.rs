use serde::{Deserialize, Serialize};
use trouve_core::{TrouveError, TrouveResult};

/// One cataloged item. The id encodes its home position as
/// `{box}{view}{sequence}`, and `photo_set` is a slash-joined list of
/// `{box}{view}` tokens naming every photo the item appears in, in
/// display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub category: String,
    #[serde(rename = "photoSet")]
    pub photo_set: String,
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One box photo. `drive_id` is the remote binary id (a Drive file id or
/// a GitHub repo path); statically seeded photos have none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoSetEntry {
    pub file: String,
    #[serde(rename = "box")]
    pub box_number: u32,
    pub view: String,
    pub category: String,
    #[serde(rename = "driveId", default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Unloaded,
    Loaded,
    DirtyPendingSave,
    SaveInFlight,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub inventory: Vec<InventoryItem>,
    pub photo_sets: Vec<PhotoSetEntry>,
    pub phase: SyncPhase,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            inventory: Vec::new(),
            photo_sets: Vec::new(),
            phase: SyncPhase::Unloaded,
        }
    }
}

impl InventoryItem {
    pub fn display_brand(&self) -> &str {
        self.brand.as_deref().unwrap_or("Unknown")
    }

    pub fn photo_tokens(&self) -> impl Iterator<Item = &str> {
        self.photo_set.split('/').filter(|token| !token.is_empty())
    }

    /// The box number parsed from the leading digits of the first photo
    /// token.
    pub fn box_number(&self) -> Option<u32> {
        let first = self.photo_tokens().next()?;
        let digits: String = first.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        let fields = [
            Some(self.item.as_str()),
            self.brand.as_deref(),
            self.model.as_deref(),
            self.notes.as_deref(),
            self.item_type.as_deref(),
        ];

        fields
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

impl PhotoSetEntry {
    pub fn token(&self) -> String {
        format!("{}{}", self.box_number, self.view)
    }
}

/// Next free view letter for a box. Letters continue after the
/// lexicographically greatest letter in use; gaps left by deletions are
/// not refilled, so ids stay unambiguous over time.
pub fn next_view_letter(photo_sets: &[PhotoSetEntry], box_number: u32) -> TrouveResult<char> {
    let max = photo_sets
        .iter()
        .filter(|entry| entry.box_number == box_number)
        .filter_map(|entry| entry.view.chars().next())
        .max();

    match max {
        None => Ok('a'),
        Some('z') => Err(TrouveError::usage(format!(
            "box {box_number} has no view letters left; all of a-z are in use"
        ))),
        Some(letter) => Ok((letter as u8 + 1) as char),
    }
}

/// Successive letters for a batch upload, all allocated from the same
/// continuation point.
pub fn allocate_view_letters(
    photo_sets: &[PhotoSetEntry],
    box_number: u32,
    count: usize,
) -> TrouveResult<Vec<char>> {
    let first = next_view_letter(photo_sets, box_number)?;
    let mut letters = Vec::with_capacity(count);

    for offset in 0..count {
        let candidate = first as u8 + offset as u8;
        if candidate > b'z' {
            return Err(TrouveError::usage(format!(
                "box {box_number} cannot take {count} more photos; view letters run out at 'z'"
            )));
        }
        letters.push(candidate as char);
    }

    Ok(letters)
}

/// Next item id for a photo token: `{token}{sequence}` with the sequence
/// continuing after the greatest one already used for that token.
pub fn next_item_id(inventory: &[InventoryItem], token: &str) -> String {
    let max = inventory
        .iter()
        .filter_map(|item| item.id.strip_prefix(token))
        .filter_map(|rest| rest.parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    format!("{token}{}", max + 1)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    pub deleted_items: Vec<String>,
    pub rewritten_items: Vec<String>,
}

/// Removes a photo token from every referencing item. Items whose only
/// photo was the deleted one are removed outright; items with more
/// photos keep the rest in their original order.
pub fn apply_photo_cascade(inventory: &mut Vec<InventoryItem>, token: &str) -> CascadeReport {
    let mut report = CascadeReport::default();

    inventory.retain_mut(|item| {
        let total = item.photo_tokens().count();
        let kept: Vec<String> = item
            .photo_tokens()
            .filter(|t| *t != token)
            .map(str::to_string)
            .collect();
        if kept.len() == total {
            return true;
        }

        if kept.is_empty() {
            report.deleted_items.push(item.id.clone());
            return false;
        }

        item.photo_set = kept.join("/");
        report.rewritten_items.push(item.id.clone());
        true
    });

    report
}

/// Load-time repair pass: strip photo tokens that no longer resolve to a
/// photo set entry, and drop items left with nothing. Returns one
/// human-readable line per repair.
pub fn reconcile(inventory: &mut Vec<InventoryItem>, photo_sets: &[PhotoSetEntry]) -> Vec<String> {
    let known: Vec<String> = photo_sets.iter().map(|entry| entry.token()).collect();
    let mut repairs = Vec::new();

    inventory.retain_mut(|item| {
        let total = item.photo_tokens().count();
        let kept: Vec<String> = item
            .photo_tokens()
            .filter(|token| known.iter().any(|k| k == token))
            .map(str::to_string)
            .collect();
        if kept.len() == total {
            return true;
        }

        if kept.is_empty() {
            repairs.push(format!(
                "dropped orphaned item '{}' ({}); none of its photos exist",
                item.id, item.item
            ));
            return false;
        }

        let repaired = kept.join("/");
        repairs.push(format!(
            "stripped dangling photo references from item '{}': {} -> {}",
            item.id, item.photo_set, repaired
        ));
        item.photo_set = repaired;
        true
    });

    repairs
}

pub fn search<'a>(
    inventory: &'a [InventoryItem],
    query: &str,
    category: Option<&str>,
) -> Vec<&'a InventoryItem> {
    inventory
        .iter()
        .filter(|item| {
            category.is_none_or(|category| item.category.eq_ignore_ascii_case(category))
        })
        .filter(|item| item.matches_query(query))
        .collect()
}

pub fn box_contents(inventory: &[InventoryItem], box_number: u32) -> Vec<&InventoryItem> {
    inventory
        .iter()
        .filter(|item| item.box_number() == Some(box_number))
        .collect()
}
