//! Pure per-record validation of domain constraints.
//!
//! Referential checks (does the referenced donor/donation exist, is this a
//! duplicate donation) depend on the store and live in the batch importer;
//! everything that can be decided from the record itself is here.

use crate::domain::{BloodProduct, Donation, Donor, ScreeningResult};
use crate::error::ValidationError;
use crate::time::Timestamp;

pub const DONOR_AGE_MIN: u32 = 18;
pub const DONOR_AGE_MAX: u32 = 65;
pub const DONATION_VOLUME_MIN_ML: f64 = 300.0;
pub const DONATION_VOLUME_MAX_ML: f64 = 500.0;
pub const HEMOGLOBIN_MIN_G_DL: f64 = 12.0;
pub const HEMOGLOBIN_MAX_G_DL: f64 = 20.0;
pub const DONATION_MAX_AGE_DAYS: i64 = 365;

// Storage temperature bands by product type
const REFRIGERATED_MIN_C: f64 = 2.0;
const REFRIGERATED_MAX_C: f64 = 6.0;
const PLASMA_MAX_C: f64 = -18.0;

pub fn validate_donor(donor: &Donor) -> Result<(), ValidationError> {
    let record = format!("Donor {}", donor.id);
    if donor.id.trim().is_empty() {
        return Err(ValidationError::missing_field("Donor", "id"));
    }
    if donor.age < DONOR_AGE_MIN || donor.age > DONOR_AGE_MAX {
        return Err(ValidationError::out_of_range(
            record,
            "age",
            f64::from(donor.age),
            f64::from(DONOR_AGE_MIN),
            f64::from(DONOR_AGE_MAX),
        ));
    }
    Ok(())
}

/// Validates a donation record against everything knowable without the
/// store: identity, volume bounds, and the allowed date window relative
/// to `now`.
pub fn validate_donation(donation: &Donation, now: Timestamp) -> Result<(), ValidationError> {
    let record = format!("Donation {}", donation.id);
    if donation.id.trim().is_empty() {
        return Err(ValidationError::missing_field("Donation", "id"));
    }
    if donation.donor_id.trim().is_empty() {
        return Err(ValidationError::missing_field(record, "donor_id"));
    }
    if donation.collection_site.trim().is_empty() {
        return Err(ValidationError::missing_field(record, "collection_site"));
    }
    if donation.staff_id.trim().is_empty() {
        return Err(ValidationError::missing_field(record, "staff_id"));
    }
    if donation.volume_collected < DONATION_VOLUME_MIN_ML
        || donation.volume_collected > DONATION_VOLUME_MAX_ML
    {
        return Err(ValidationError::out_of_range(
            record,
            "volume_collected",
            donation.volume_collected,
            DONATION_VOLUME_MIN_ML,
            DONATION_VOLUME_MAX_ML,
        ));
    }
    if donation.donation_date > now {
        return Err(ValidationError::FutureDonationDate {
            id: donation.id.clone(),
        });
    }
    if donation.donation_date < now.saturating_sub_days(DONATION_MAX_AGE_DAYS) {
        return Err(ValidationError::DonationDateTooOld {
            id: donation.id.clone(),
            max_age_days: DONATION_MAX_AGE_DAYS,
        });
    }
    Ok(())
}

/// Validates a blood product against its source donation.
pub fn validate_product(product: &BloodProduct, source: &Donation) -> Result<(), ValidationError> {
    let record = format!("Product {}", product.id);
    if product.id.trim().is_empty() {
        return Err(ValidationError::missing_field("Product", "id"));
    }
    if product.product_type.trim().is_empty() {
        return Err(ValidationError::missing_field(record, "product_type"));
    }
    if product.location.trim().is_empty() {
        return Err(ValidationError::missing_field(record, "location"));
    }
    if product.volume <= 0.0 {
        return Err(ValidationError::out_of_range(
            record,
            "volume",
            product.volume,
            0.0,
            source.volume_collected,
        ));
    }
    if product.expiry_date <= product.collection_date {
        return Err(ValidationError::ExpiryBeforeCollection {
            id: product.id.clone(),
        });
    }
    if product.blood_type != source.blood_type {
        return Err(ValidationError::BloodTypeMismatch {
            id: product.id.clone(),
        });
    }
    if product.volume > source.volume_collected {
        return Err(ValidationError::VolumeExceedsDonation {
            id: product.id.clone(),
        });
    }
    if let Some(temperature) = product.temperature {
        let product_type = product.product_type.to_lowercase();
        let out_of_band = if product_type == "whole blood" || product_type == "red blood cells" {
            !(REFRIGERATED_MIN_C..=REFRIGERATED_MAX_C).contains(&temperature)
        } else if product_type == "plasma" {
            temperature > PLASMA_MAX_C
        } else {
            false
        };
        if out_of_band {
            return Err(ValidationError::InvalidTemperature {
                id: product.id.clone(),
                temperature,
                product_type: product.product_type.clone(),
            });
        }
    }
    Ok(())
}

pub fn validate_screening(result: &ScreeningResult) -> Result<(), ValidationError> {
    let record = format!("Screening result for donor {}", result.donor_id);
    if result.donor_id.trim().is_empty() {
        return Err(ValidationError::missing_field(
            "Screening result",
            "donor_id",
        ));
    }
    if result.hemoglobin_level < HEMOGLOBIN_MIN_G_DL || result.hemoglobin_level > HEMOGLOBIN_MAX_G_DL
    {
        return Err(ValidationError::out_of_range(
            record,
            "hemoglobin_level",
            result.hemoglobin_level,
            HEMOGLOBIN_MIN_G_DL,
            HEMOGLOBIN_MAX_G_DL,
        ));
    }
    Ok(())
}
