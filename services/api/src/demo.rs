use crate::infra::{build_service, parse_currency, parse_date, parse_reward_model, ApiService};
use crate::routes::{quote_reward, QuoteRequest};
use campaign_engine::config::MarketplaceConfig;
use campaign_engine::error::AppError;
use campaign_engine::marketplace::{
    Actor, Campaign, Clock, Currency, GigContent, InfluencerId, InfluencerProfile,
    InfluencerState, MarketplaceError, Money, NewCampaign, NewPost, Offer, PostType, RewardModel,
    Targeting, VatTable,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Campaign launch date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Hours a posted gig must stay live before the reward can be claimed.
    #[arg(long)]
    pub(crate) review_period_hours: Option<u32>,
    /// Optional VAT rate CSV with `region,start,end,percent` rows.
    #[arg(long)]
    pub(crate) vat_table: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Reward model: assets, cash, reach, engagement or impressions
    #[arg(long, value_parser = parse_reward_model)]
    pub(crate) reward_model: RewardModel,
    /// Campaign budget in minor units (pence, cents)
    #[arg(long)]
    pub(crate) budget: u64,
    /// Fund size in the reward model's unit
    #[arg(long)]
    pub(crate) units: u64,
    /// Number of posts in the campaign
    #[arg(long, default_value_t = 1)]
    pub(crate) posts: u64,
    #[arg(long, default_value_t = 0)]
    pub(crate) followers: u64,
    /// Engagement rate as a fraction of followers (0.035 = 3.5%)
    #[arg(long, default_value_t = 0.0)]
    pub(crate) engagement_rate: f64,
    #[arg(long)]
    pub(crate) estimated_impressions: Option<u64>,
    /// Influencer's tax region
    #[arg(long, default_value = "GB")]
    pub(crate) region: String,
    #[arg(long)]
    pub(crate) vat_registered: bool,
    #[arg(long, value_parser = parse_currency, default_value = "GBP")]
    pub(crate) currency: Currency,
    /// Date the VAT rate is looked up on (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Optional VAT rate CSV replacing the built-in rates
    #[arg(long)]
    pub(crate) vat_table: Option<PathBuf>,
}

pub(crate) fn run_reward_quote(args: QuoteArgs) -> Result<(), AppError> {
    let vat_table = vat_table_from(args.vat_table.as_ref())?;
    let request = QuoteRequest {
        reward_model: args.reward_model,
        budget: args.budget,
        currency: Some(args.currency),
        units: args.units,
        posts: args.posts,
        followers: args.followers,
        engagement_rate: args.engagement_rate,
        recent_posts: Vec::new(),
        estimated_impressions: args.estimated_impressions,
        region: args.region,
        vat_registered: args.vat_registered,
        date: args.date,
    };

    let quote = quote_reward(&request, args.currency, &vat_table)?;
    println!("Reward quote ({})", quote.reward_model.label());
    println!(
        "- {} of {} fund units ({:.2}% share)",
        quote.units, quote.fund_units, quote.share_percentage
    );
    println!("- Net reward: {}", quote.reward.net);
    println!(
        "- VAT: {} ({:.2}% for {})",
        quote.reward.vat,
        quote.reward.vat_percentage,
        request.region.to_ascii_uppercase()
    );
    println!("- Total payable: {}", quote.reward.total);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        review_period_hours,
        vat_table,
    } = args;

    let start = start.unwrap_or_else(|| Utc::now().date_naive());
    let mut config = MarketplaceConfig::default();
    if let Some(hours) = review_period_hours {
        config.review_period_hours = hours;
    }
    let vat_table = vat_table_from(vat_table.as_ref())?;

    let clock = Arc::new(SteppingClock::starting(start));
    let (service, payouts) = build_service(&config, vat_table, clock.clone());

    println!("Campaign engine demo");
    println!(
        "- Launch date {} | review period {}h",
        start, config.review_period_hours
    );

    if let Err(err) = walkthrough(&service, &clock, &config) {
        println!("\nDemo stopped: {err}");
        return Ok(());
    }

    println!("\nPayout rail settled {} payment(s)", payouts.settled());
    Ok(())
}

fn walkthrough(
    service: &ApiService,
    clock: &SteppingClock,
    config: &MarketplaceConfig,
) -> Result<Option<Offer>, MarketplaceError> {
    let campaign = service.create_campaign(demo_campaign(clock.now()))?;
    let campaign = service.launch_campaign(&campaign.id, Actor::Brand)?;
    println!(
        "\nLaunched {} '{}' ({} model, {} units for {})",
        campaign.id,
        campaign.name,
        campaign.reward_model.label(),
        campaign.units,
        campaign.budget
    );

    let roster = [
        ("trailola", 40_000, true),
        ("kai.outdoors", 35_000, false),
        ("mia.runs", 30_000, false),
    ];
    let mut offers = Vec::new();
    for (handle, followers, vat_registered) in roster {
        let profile = service.register_influencer(demo_influencer(handle, followers, vat_registered))?;
        let offer = service.create_offer(&campaign.id, &profile.id, Actor::Brand)?;
        let offer = service.send_invite(&offer.id, Actor::Brand)?;
        println!(
            "- Invited @{} -> {} for {} units, reward {}",
            profile.username, offer.id, offer.units, offer.reward
        );
        offers.push(offer);
    }

    println!("\nReservations");
    let mut reserved = Vec::new();
    for offer in &offers {
        match service.reserve_offer(&offer.id) {
            Ok(offer) => {
                println!("- {} reserved {} units ({})", offer.id, offer.units, offer.state.label());
                reserved.push(offer);
            }
            Err(err) => println!("- {} refused: {err}", offer.id),
        }
    }
    print_fund(service, &campaign)?;

    let Some(lead) = reserved.first() else {
        return Ok(None);
    };
    publish(service, clock, &campaign, lead)?;

    println!("\nClaiming {}", lead.id);
    match service.claim_reward(&lead.id) {
        Err(MarketplaceError::NotClaimable(blockers)) => {
            for blocker in blockers {
                println!("- Blocked: {}", blocker.summary());
            }
        }
        Err(err) => return Err(err),
        Ok(offer) => println!("- Claimed early as {}", offer.state.label()),
    }

    clock.advance(Duration::hours(i64::from(config.review_period_hours) + 1));
    println!(
        "- Clock advanced past the review period to {}",
        clock.now().to_rfc3339()
    );

    let view = service.offer_view(&lead.id)?;
    println!(
        "- Reward breakdown: net {} + VAT {} ({:.2}%) = {}",
        view.reward.net, view.reward.vat, view.reward.vat_percentage, view.reward.total
    );

    let paid = service.claim_reward(&lead.id)?;
    if let Some(payment) = &paid.payment {
        println!(
            "- Payment {} {:?} for {} (reference {})",
            payment.id,
            payment.state,
            payment.amount,
            payment.reference.as_deref().unwrap_or("pending")
        );
    }

    let closed = service.complete_campaign(&campaign.id, Actor::Brand)?;
    println!("\nCampaign {} is now {:?}", closed.id, closed.state);
    print_fund(service, &closed)?;
    Ok(Some(paid))
}

fn publish(
    service: &ApiService,
    clock: &SteppingClock,
    campaign: &Campaign,
    offer: &Offer,
) -> Result<(), MarketplaceError> {
    println!("\nGig flow for {} ({})", offer.id, offer.state.label());

    for post in &campaign.posts {
        let gig = service.submit_gig(
            &offer.id,
            &post.id,
            GigContent {
                caption: "First ridge run in the new trail shoes".to_string(),
                media_url: "https://cdn.example.com/gigs/ridge.jpg".to_string(),
            },
        )?;
        println!("- Submitted {} for {}", gig.id, post.id);

        clock.advance(Duration::hours(3));
        let gig = service.approve_gig(&gig.id, Actor::Brand)?;
        println!("- Brand approved {} ({})", gig.id, gig.state.label());

        clock.advance(Duration::hours(1));
        let gig = service.link_post(
            &gig.id,
            format!("https://instagram.com/p/{}", gig.id),
            None,
        )?;
        println!("- Posted {} live ({})", gig.id, gig.state.label());
    }
    Ok(())
}

fn print_fund(service: &ApiService, campaign: &Campaign) -> Result<(), MarketplaceError> {
    let progress = service.fund_progress(&campaign.id)?;
    println!(
        "Fund: {} reserved / {} total ({:.1}%), {} remaining, reservable: {}",
        progress.reserved,
        progress.total,
        progress.reserved_percentage,
        progress.remaining,
        progress.is_reservable
    );
    Ok(())
}

fn vat_table_from(path: Option<&PathBuf>) -> Result<VatTable, AppError> {
    match path {
        Some(path) => Ok(VatTable::from_path(path)?),
        None => Ok(VatTable::standard()),
    }
}

fn demo_campaign(now: DateTime<Utc>) -> NewCampaign {
    NewCampaign {
        advertiser: "Northpeak Outdoor".to_string(),
        name: "Spring trail launch".to_string(),
        reward_model: RewardModel::Reach,
        units: 100_000,
        budget: Money::new(200_000, Currency::Gbp),
        posts: vec![NewPost {
            post_type: PostType::Standard,
            opened_at: now,
            deadline: now + Duration::days(14),
            requires_review_before_posting: true,
            brief: "Show the shoes on your favourite local trail".to_string(),
        }],
        targeting: Targeting {
            regions: vec!["GB".to_string()],
            min_followers: Some(10_000),
            ..Targeting::default()
        },
        apply_first: false,
        brand_match: false,
        brand_safety: false,
        require_insights: false,
        review_period_hours: None,
    }
}

fn demo_influencer(handle: &str, followers: u64, vat_registered: bool) -> InfluencerProfile {
    InfluencerProfile {
        id: InfluencerId::from(format!("inf-{handle}").as_str()),
        username: handle.to_string(),
        region: "GB".to_string(),
        gender: None,
        birthday: None,
        followers,
        engagement_rate: 0.04,
        estimated_impressions: None,
        vat_registered,
        interests: vec!["running".to_string()],
        state: InfluencerState::Verified,
    }
}

/// Clock the walkthrough moves forward explicitly so the review period can elapse.
struct SteppingClock {
    now: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    fn starting(date: NaiveDate) -> Self {
        let opening = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN);
        Self {
            now: Mutex::new(Utc.from_utc_datetime(&date.and_time(opening))),
        }
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
