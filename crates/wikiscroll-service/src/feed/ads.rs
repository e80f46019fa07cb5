use crate::config::AdsConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdPlacement {
    Feed,
    Library,
}

/// Third-party ad network unit the client should render instead of the creative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSlot {
    pub client: String,
    pub slot: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdSlot {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub cta_text: String,
    pub cta_url: String,
    pub advertiser: String,
    pub skip_delay_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_slot: Option<NetworkSlot>,
}

/// Where sponsored items come from.
pub trait AdSupply: Send + Sync + 'static {
    fn inventory(&self, placement: AdPlacement) -> &[AdSlot];

    fn find(&self, ad_id: &str) -> Option<&AdSlot> {
        self.inventory(AdPlacement::Feed)
            .iter()
            .chain(self.inventory(AdPlacement::Library))
            .find(|ad| ad.id == ad_id)
    }
}

/// Fixed in-memory inventory.
#[derive(Debug, Clone)]
pub struct StaticAdInventory {
    feed: Vec<AdSlot>,
    library: Vec<AdSlot>,
}

impl StaticAdInventory {
    pub fn new(ads: Vec<AdSlot>) -> Self {
        Self {
            feed: ads.clone(),
            library: ads,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Built-in creatives, tagged with network slots when a network is configured.
    pub fn from_config(config: &AdsConfig) -> Self {
        let ads = builtin_ads(config.skip_delay.as_secs());
        if !config.third_party_enabled || config.network_client.is_empty() {
            return Self::new(ads);
        }

        let tag = |slot: &str| -> Vec<AdSlot> {
            ads.iter()
                .cloned()
                .map(|mut ad| {
                    if !slot.is_empty() {
                        ad.network_slot = Some(NetworkSlot {
                            client: config.network_client.clone(),
                            slot: slot.to_string(),
                        });
                    }
                    ad
                })
                .collect()
        };

        Self {
            feed: tag(&config.network_feed_slot),
            library: tag(&config.network_library_slot),
        }
    }
}

impl AdSupply for StaticAdInventory {
    fn inventory(&self, placement: AdPlacement) -> &[AdSlot] {
        match placement {
            AdPlacement::Feed => &self.feed,
            AdPlacement::Library => &self.library,
        }
    }
}

fn builtin_ads(skip_delay_seconds: u64) -> Vec<AdSlot> {
    let ad = |id: &str, title: &str, description: &str, cta: &str, url: &str, by: &str| AdSlot {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        image_url: format!("https://images.wikiscroll.app/ads/{id}.jpg"),
        cta_text: cta.to_string(),
        cta_url: url.to_string(),
        advertiser: by.to_string(),
        skip_delay_seconds,
        network_slot: None,
    };

    vec![
        ad(
            "ad-1",
            "Impara una nuova lingua",
            "Lezioni da 10 minuti al giorno, ovunque tu sia.",
            "Inizia gratis",
            "https://example.com/lingue",
            "LinguaFacile",
        ),
        ad(
            "ad-2",
            "Musei da casa",
            "Tour virtuali nei musei più belli del mondo.",
            "Scopri di più",
            "https://example.com/musei",
            "ArteOvunque",
        ),
        ad(
            "ad-3",
            "Audiolibri illimitati",
            "Oltre 100.000 titoli da ascoltare in viaggio.",
            "Prova 30 giorni",
            "https://example.com/audiolibri",
            "Ascolta+",
        ),
        ad(
            "ad-4",
            "Telescopi per principianti",
            "Guarda gli anelli di Saturno dal tuo balcone.",
            "Acquista ora",
            "https://example.com/telescopi",
            "StellaPolare",
        ),
    ]
}
