use super::ads::AdSlot;
use crate::models::Post;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedItem {
    Post(Post),
    Ad(AdSlot),
}

impl FeedItem {
    pub fn is_ad(&self) -> bool {
        matches!(self, FeedItem::Ad(_))
    }
}

/// Index into the post list or the ad inventory for one assembled position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Post(usize),
    Ad(usize),
}

/// Number of ads inserted for `post_count` posts: one after every `frequency`
/// posts, never after the last one.
pub fn ad_count(post_count: usize, frequency: usize, ads_available: usize) -> usize {
    if frequency == 0 || post_count == 0 || ads_available == 0 {
        return 0;
    }
    (post_count - 1) / frequency
}

pub fn assembled_len(post_count: usize, frequency: usize, ads_available: usize) -> usize {
    post_count + ad_count(post_count, frequency, ads_available)
}

/// Inserts an ad after every `frequency`-th post, cycling through `ads`.
/// With `frequency == 0` or no ads the posts are returned unchanged.
pub fn interleave_ads(posts: &[Post], frequency: usize, ads: &[AdSlot]) -> Vec<FeedItem> {
    let mut items = Vec::with_capacity(assembled_len(posts.len(), frequency, ads.len()));
    let mut next_ad = 0;

    for (index, post) in posts.iter().enumerate() {
        items.push(FeedItem::Post(post.clone()));

        let after_nth = frequency > 0 && (index + 1) % frequency == 0;
        if after_nth && !ads.is_empty() && index + 1 < posts.len() {
            items.push(FeedItem::Ad(ads[next_ad % ads.len()].clone()));
            next_ad += 1;
        }
    }

    items
}

/// Resolves an assembled position without materialising the sequence.
pub fn locate(
    position: usize,
    post_count: usize,
    frequency: usize,
    ads_available: usize,
) -> Option<Slot> {
    if position >= assembled_len(post_count, frequency, ads_available) {
        return None;
    }
    if frequency == 0 || ads_available == 0 {
        return Some(Slot::Post(position));
    }

    let block = position / (frequency + 1);
    let offset = position % (frequency + 1);
    if offset < frequency {
        Some(Slot::Post(block * frequency + offset))
    } else {
        Some(Slot::Ad(block % ads_available))
    }
}
