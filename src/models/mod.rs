pub mod affiliate;
pub mod appointment;
pub mod automation;
pub mod campaign_history;
pub mod email_campaign;
pub mod lead;
pub mod referral;

pub use email_campaign::CampaignDto;
pub use lead::LeadDto;
