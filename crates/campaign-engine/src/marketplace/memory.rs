//! Process-local store used by the demo server and tests.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use super::campaign::Campaign;
use super::domain::{CampaignId, GigId, InfluencerId, OfferId};
use super::gig::Gig;
use super::influencer::InfluencerProfile;
use super::offer::Offer;
use super::repository::{
    CampaignRepository, GigRepository, InfluencerRepository, OfferRepository, RepositoryError,
};

#[derive(Debug, Default, Clone)]
pub struct InMemoryMarketplaceStore {
    campaigns: Arc<Mutex<HashMap<CampaignId, Campaign>>>,
    offers: Arc<Mutex<HashMap<OfferId, Offer>>>,
    gigs: Arc<Mutex<HashMap<GigId, Gig>>>,
    influencers: Arc<Mutex<HashMap<InfluencerId, InfluencerProfile>>>,
}

fn guard<K, V>(
    table: &Mutex<HashMap<K, V>>,
) -> Result<MutexGuard<'_, HashMap<K, V>>, RepositoryError> {
    table
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

fn insert<K: Eq + Hash + Clone, V: Clone>(
    table: &Mutex<HashMap<K, V>>,
    key: &K,
    value: V,
) -> Result<V, RepositoryError> {
    let mut records = guard(table)?;
    if records.contains_key(key) {
        return Err(RepositoryError::Conflict);
    }
    records.insert(key.clone(), value.clone());
    Ok(value)
}

fn update<K: Eq + Hash + Clone, V>(
    table: &Mutex<HashMap<K, V>>,
    key: &K,
    value: V,
) -> Result<(), RepositoryError> {
    let mut records = guard(table)?;
    match records.get_mut(key) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(RepositoryError::NotFound),
    }
}

fn fetch<K: Eq + Hash, V: Clone>(
    table: &Mutex<HashMap<K, V>>,
    key: &K,
) -> Result<Option<V>, RepositoryError> {
    Ok(guard(table)?.get(key).cloned())
}

impl CampaignRepository for InMemoryMarketplaceStore {
    fn insert_campaign(&self, campaign: Campaign) -> Result<Campaign, RepositoryError> {
        let id = campaign.id.clone();
        insert(&self.campaigns, &id, campaign)
    }

    fn update_campaign(&self, campaign: Campaign) -> Result<(), RepositoryError> {
        let id = campaign.id.clone();
        update(&self.campaigns, &id, campaign)
    }

    fn fetch_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, RepositoryError> {
        fetch(&self.campaigns, id)
    }
}

impl OfferRepository for InMemoryMarketplaceStore {
    fn insert_offer(&self, offer: Offer) -> Result<Offer, RepositoryError> {
        let id = offer.id.clone();
        insert(&self.offers, &id, offer)
    }

    fn update_offer(&self, offer: Offer) -> Result<(), RepositoryError> {
        let id = offer.id.clone();
        update(&self.offers, &id, offer)
    }

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        fetch(&self.offers, id)
    }

    fn offers_by_campaign(&self, campaign_id: &CampaignId) -> Result<Vec<Offer>, RepositoryError> {
        let records = guard(&self.offers)?;
        let mut offers: Vec<Offer> = records
            .values()
            .filter(|offer| &offer.campaign_id == campaign_id)
            .cloned()
            .collect();
        offers.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(offers)
    }
}

impl GigRepository for InMemoryMarketplaceStore {
    fn insert_gig(&self, gig: Gig) -> Result<Gig, RepositoryError> {
        let id = gig.id.clone();
        insert(&self.gigs, &id, gig)
    }

    fn update_gig(&self, gig: Gig) -> Result<(), RepositoryError> {
        let id = gig.id.clone();
        update(&self.gigs, &id, gig)
    }

    fn fetch_gig(&self, id: &GigId) -> Result<Option<Gig>, RepositoryError> {
        fetch(&self.gigs, id)
    }

    fn gigs_by_offer(&self, offer_id: &OfferId) -> Result<Vec<Gig>, RepositoryError> {
        let records = guard(&self.gigs)?;
        let mut gigs: Vec<Gig> = records
            .values()
            .filter(|gig| &gig.offer_id == offer_id)
            .cloned()
            .collect();
        gigs.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(gigs)
    }
}

impl InfluencerRepository for InMemoryMarketplaceStore {
    fn insert_influencer(
        &self,
        influencer: InfluencerProfile,
    ) -> Result<InfluencerProfile, RepositoryError> {
        let id = influencer.id.clone();
        insert(&self.influencers, &id, influencer)
    }

    fn fetch_influencer(
        &self,
        id: &InfluencerId,
    ) -> Result<Option<InfluencerProfile>, RepositoryError> {
        fetch(&self.influencers, id)
    }
}
