use rust_embed::Embed;

use crate::store::schema::QuestionBank;

#[derive(Embed)]
#[folder = "assets/"]
struct BankAssets;

const BANK_FILE: &str = "questions.json";

/// The question bank shipped inside the binary. Empty if the asset is missing
/// or does not parse.
pub fn default_question_bank() -> QuestionBank {
    let Some(file) = BankAssets::get(BANK_FILE) else {
        log::warn!("Bundled {BANK_FILE} is missing");
        return QuestionBank::default();
    };
    match serde_json::from_slice(&file.data) {
        Ok(bank) => bank,
        Err(e) => {
            log::warn!("Bundled {BANK_FILE} could not be parsed: {e}");
            QuestionBank::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tier::Tier;

    #[test]
    fn test_bundled_bank_covers_every_tier() {
        let bank = default_question_bank();
        for &tier in Tier::all() {
            let mains = bank.main_questions(tier, &[], 100);
            assert!(mains.len() >= 5, "{tier} has only {} questions", mains.len());
            for main in mains {
                let subs = bank.sub_questions(main.id).unwrap();
                assert!(!subs.is_empty(), "question {} has no steps", main.id);
                for sq in subs {
                    assert!(
                        sq.choices.contains(&sq.correct_choice),
                        "sub-question {} lacks its answer among the choices",
                        sq.id
                    );
                }
            }
        }
    }
}
