pub mod ads;
pub mod assembler;
pub mod interleave;
pub mod prefetch;
pub mod realtime;
pub mod session;

pub use ads::{AdPlacement, AdSlot, AdSupply, StaticAdInventory};
pub use assembler::{FeedAssembler, FetchPlan, LoadOutcome};
pub use interleave::{FeedItem, Slot, interleave_ads, locate};
pub use prefetch::{spawn_prefetcher, top_up};
pub use realtime::PostEvents;
pub use session::{FeedSession, FeedSessions, Mount, MountedItem};

use crate::config::AdsConfig;

/// Ad cadence and inventory for one placement. An empty inventory disables ads.
#[derive(Debug, Clone, Copy)]
pub struct AdLayout<'a> {
    pub frequency: usize,
    pub ads: &'a [AdSlot],
}

impl<'a> AdLayout<'a> {
    pub fn resolve<A: AdSupply>(config: &AdsConfig, supply: &'a A, placement: AdPlacement) -> Self {
        let frequency = match placement {
            AdPlacement::Feed => config.feed_frequency,
            AdPlacement::Library => config.library_frequency,
        };
        let ads = if config.enabled && frequency > 0 {
            supply.inventory(placement)
        } else {
            &[]
        };
        Self { frequency, ads }
    }

    pub fn interleave(&self, posts: &[crate::models::Post]) -> Vec<FeedItem> {
        interleave_ads(posts, self.frequency, self.ads)
    }

    pub fn assembled_len(&self, post_count: usize) -> usize {
        interleave::assembled_len(post_count, self.frequency, self.ads.len())
    }

    pub fn locate(&self, position: usize, post_count: usize) -> Option<Slot> {
        locate(position, post_count, self.frequency, self.ads.len())
    }
}
