//! Investigation branches and the merge decisions that pick between them.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{collect_lenient, decode_json, encode_json, parse_enum};
use crate::error::{StoreError, StoreResult};
use crate::model::entities::{BranchStatus, InvestigationBranch, MergeDecision};
use crate::model::now_timestamp;
use crate::model::vectors::EpistemicVectors;

const BRANCH_COLS: &str = "id, session_id, branch_name, investigation_path, git_branch_name, \
     preflight_vectors, postflight_vectors, tokens_spent, time_spent_minutes, merge_score, \
     epistemic_quality, is_winner, created_timestamp, checkpoint_timestamp, merged_timestamp, \
     status";

fn branch_from_row(row: &Row) -> rusqlite::Result<StoreResult<InvestigationBranch>> {
    let id: String = row.get(0)?;
    let raw_pre: String = row.get(5)?;
    let raw_post: Option<String> = row.get(6)?;
    let raw_status: String = row.get(15)?;

    let decoded = (|| -> StoreResult<_> {
        let pre: EpistemicVectors = decode_json("branch", &id, &raw_pre)?;
        let post = raw_post
            .as_deref()
            .map(|raw| decode_json::<EpistemicVectors>("branch", &id, raw))
            .transpose()?;
        let status: BranchStatus = parse_enum("branch", &id, &raw_status)?;
        Ok((pre, post, status))
    })();
    let (preflight_vectors, postflight_vectors, status) = match decoded {
        Ok(parts) => parts,
        Err(e) => return Ok(Err(e)),
    };

    Ok(Ok(InvestigationBranch {
        session_id: row.get(1)?,
        branch_name: row.get(2)?,
        investigation_path: row.get(3)?,
        git_branch_name: row.get(4)?,
        preflight_vectors,
        postflight_vectors,
        tokens_spent: row.get::<_, i64>(7)?.max(0) as u64,
        time_spent_minutes: row.get::<_, i64>(8)?.max(0) as u64,
        merge_score: row.get(9)?,
        epistemic_quality: row.get(10)?,
        is_winner: row.get(11)?,
        created_timestamp: row.get(12)?,
        checkpoint_timestamp: row.get(13)?,
        merged_timestamp: row.get(14)?,
        status,
        id,
    }))
}

pub fn create_branch(conn: &Connection, b: &InvestigationBranch) -> StoreResult<()> {
    let pre = encode_json("branch", &b.preflight_vectors)?;
    let post = b
        .postflight_vectors
        .as_ref()
        .map(|v| encode_json("branch", v))
        .transpose()?;
    conn.execute(
        &format!(
            "INSERT INTO investigation_branches ({BRANCH_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            b.id,
            b.session_id,
            b.branch_name,
            b.investigation_path,
            b.git_branch_name,
            pre,
            post,
            b.tokens_spent as i64,
            b.time_spent_minutes as i64,
            b.merge_score,
            b.epistemic_quality,
            b.is_winner,
            b.created_timestamp,
            b.checkpoint_timestamp,
            b.merged_timestamp,
            b.status.as_str(),
        ],
    )?;
    info!(id = %b.id, git_branch = %b.git_branch_name, "investigation branch opened");
    Ok(())
}

pub fn get_branch(conn: &Connection, id: &str) -> StoreResult<InvestigationBranch> {
    conn.query_row(
        &format!("SELECT {BRANCH_COLS} FROM investigation_branches WHERE id = ?1"),
        params![id],
        branch_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("branch", id))?
}

/// Branches of a session in the order they were opened.
pub fn list_branches(conn: &Connection, session_id: &str) -> StoreResult<Vec<InvestigationBranch>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BRANCH_COLS} FROM investigation_branches WHERE session_id = ?1
         ORDER BY created_timestamp ASC"
    ))?;
    let rows = stmt
        .query_map(params![session_id], branch_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    collect_lenient(rows)
}

/// Record postflight vectors and cost. Both `epistemic_quality` and
/// `merge_score` become the postflight overall confidence, which is returned.
pub fn checkpoint_branch(
    conn: &Connection,
    id: &str,
    postflight: &EpistemicVectors,
    tokens_spent: u64,
    time_spent_minutes: u64,
) -> StoreResult<f64> {
    let quality = postflight.overall_confidence();
    let post = encode_json("branch", postflight)?;
    let changed = conn.execute(
        "UPDATE investigation_branches
         SET postflight_vectors = ?1, tokens_spent = ?2, time_spent_minutes = ?3,
             epistemic_quality = ?4, merge_score = ?4, checkpoint_timestamp = ?5
         WHERE id = ?6",
        params![
            post,
            tokens_spent as i64,
            time_spent_minutes as i64,
            quality,
            now_timestamp(),
            id
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("branch", id));
    }
    info!(id, quality, tokens_spent, "branch checkpointed");
    Ok(quality)
}

/// Flag a branch as the merged winner.
pub fn mark_branch_winner(conn: &Connection, id: &str) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE investigation_branches SET is_winner = 1, status = ?1, merged_timestamp = ?2
         WHERE id = ?3",
        params![BranchStatus::Merged.as_str(), now_timestamp(), id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("branch", id));
    }
    info!(id, "branch marked winner");
    Ok(())
}

pub fn create_merge_decision(conn: &Connection, d: &MergeDecision) -> StoreResult<()> {
    let others = encode_json("merge_decision", &d.other_branches)?;
    conn.execute(
        "INSERT INTO merge_decisions (id, session_id, investigation_round, winning_branch_id,
             winning_branch_name, winning_score, other_branches, decision_rationale,
             created_timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            d.id,
            d.session_id,
            d.investigation_round,
            d.winning_branch_id,
            d.winning_branch_name,
            d.winning_score,
            others,
            d.decision_rationale,
            d.created_timestamp,
        ],
    )?;
    info!(id = %d.id, winner = %d.winning_branch_id, score = d.winning_score, "merge decision recorded");
    Ok(())
}

/// Number of merge decisions already recorded for a session.
pub fn count_merge_decisions(conn: &Connection, session_id: &str) -> StoreResult<u32> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM merge_decisions WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::model::new_id;

    fn strong() -> EpistemicVectors {
        EpistemicVectors {
            know: 0.9,
            context: 0.9,
            clarity: 0.9,
            coherence: 0.9,
            uncertainty: 0.1,
            ..EpistemicVectors::neutral()
        }
    }

    #[test]
    fn checkpoint_sets_quality_from_postflight() {
        let conn = open_memory_database().unwrap();
        let b = InvestigationBranch::new("s", "jwt", "auth/jwt", "inv/jwt", EpistemicVectors::neutral());
        create_branch(&conn, &b).unwrap();

        let post = strong();
        let quality = checkpoint_branch(&conn, &b.id, &post, 1200, 15).unwrap();
        assert!((quality - post.overall_confidence()).abs() < 1e-9);

        let got = get_branch(&conn, &b.id).unwrap();
        assert_eq!(got.postflight_vectors, Some(post));
        assert_eq!(got.merge_score, Some(quality));
        assert_eq!(got.epistemic_quality, Some(quality));
        assert_eq!((got.tokens_spent, got.time_spent_minutes), (1200, 15));
        assert!(got.checkpoint_timestamp.is_some());
    }

    #[test]
    fn winner_is_merged_and_decision_recorded() {
        let conn = open_memory_database().unwrap();
        let a = InvestigationBranch::new("s", "a", "p", "inv/a", EpistemicVectors::neutral());
        let b = InvestigationBranch::new("s", "b", "p", "inv/b", EpistemicVectors::neutral());
        create_branch(&conn, &a).unwrap();
        create_branch(&conn, &b).unwrap();

        mark_branch_winner(&conn, &a.id).unwrap();
        create_merge_decision(
            &conn,
            &MergeDecision {
                id: new_id(),
                session_id: "s".into(),
                investigation_round: 1,
                winning_branch_id: a.id.clone(),
                winning_branch_name: Some("a".into()),
                winning_score: 0.8,
                other_branches: vec![b.id.clone()],
                decision_rationale: "higher quality".into(),
                created_timestamp: 1.0,
            },
        )
        .unwrap();

        let branches = list_branches(&conn, "s").unwrap();
        let winner = branches.iter().find(|x| x.id == a.id).unwrap();
        assert!(winner.is_winner);
        assert_eq!(winner.status, BranchStatus::Merged);
        assert_eq!(count_merge_decisions(&conn, "s").unwrap(), 1);
        assert!(mark_branch_winner(&conn, "s-missing").unwrap_err().is_not_found());
    }
}
