use chrono::Utc;
use pretty_assertions::assert_eq;
use serial_test::serial;
use uuid::Uuid;

use vortex_core::AppError;
use vortex_core::database::models::InvitationStatus;

mod common;

#[tokio::test]
async fn test_accept_link_admits_and_binds_invitee() {
    let app = common::TestApp::new().await.unwrap();
    let captain_id = Uuid::new_v4();
    let team = common::create_team(&app, captain_id).await.unwrap();

    let invitation = app
        .state
        .invitations
        .issue_link(team.id, captain_id)
        .await
        .unwrap();

    let user_id = Uuid::new_v4();
    let member = app
        .state
        .invitations
        .accept(&invitation.token, user_id, Utc::now())
        .await
        .unwrap();

    assert_eq!(member.team_id, team.id);
    assert_eq!(member.user_id, user_id);

    // consumption bound the open link to its first consumer
    let consumed = app
        .state
        .invitations
        .find_by_token(&invitation.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(consumed.status, InvitationStatus::Accepted);
    assert_eq!(consumed.invitee_id, Some(user_id));

    // spent tokens cannot be replayed, not even by another user
    let err = app
        .state
        .invitations
        .accept(&invitation.token, Uuid::new_v4(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));
}

#[tokio::test]
async fn test_accept_nomination_clears_notification() {
    let app = common::TestApp::new().await.unwrap();
    let captain_id = Uuid::new_v4();
    let invitee_id = Uuid::new_v4();
    let team = common::create_team(&app, captain_id).await.unwrap();

    let invitation = app
        .state
        .invitations
        .issue_nomination(team.id, captain_id, invitee_id)
        .await
        .unwrap();

    // a different user cannot consume a targeted nomination
    let err = app
        .state
        .invitations
        .accept(&invitation.token, Uuid::new_v4(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotYourInvitation));

    app.state
        .invitations
        .accept(&invitation.token, invitee_id, Utc::now())
        .await
        .unwrap();

    let ledger = vortex_core::MembershipLedger::new(app.db.pool.clone());
    assert!(ledger.is_member(team.id, invitee_id).await.unwrap());

    let (notifications,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = ?")
            .bind(invitee_id)
            .fetch_one(&app.db.pool)
            .await
            .unwrap();
    assert_eq!(notifications, 0);
}

#[tokio::test]
async fn test_accept_into_full_team_leaves_token_pending() {
    let app = common::TestApp::new().await.unwrap();
    let captain_id = Uuid::new_v4();
    let team = common::create_team(&app, captain_id).await.unwrap();

    // fill the remaining five slots through the normal acceptance path
    for _ in 0..5 {
        let invitation = app
            .state
            .invitations
            .issue_link(team.id, captain_id)
            .await
            .unwrap();
        app.state
            .invitations
            .accept(&invitation.token, Uuid::new_v4(), Utc::now())
            .await
            .unwrap();
    }

    let invitation = app
        .state
        .invitations
        .issue_link(team.id, captain_id)
        .await
        .unwrap();
    let err = app
        .state
        .invitations
        .accept(&invitation.token, Uuid::new_v4(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TeamFull));

    let roster = app.state.teams.roster(team.id).await.unwrap();
    assert_eq!(roster.len(), 6);

    // capacity failure must not burn the token
    let unspent = app
        .state
        .invitations
        .find_by_token(&invitation.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unspent.status, InvitationStatus::Pending);
}

#[tokio::test]
async fn test_accept_twice_reports_already_member() {
    let app = common::TestApp::new().await.unwrap();
    let captain_id = Uuid::new_v4();
    let team = common::create_team(&app, captain_id).await.unwrap();
    let user_id = Uuid::new_v4();

    let first = app
        .state
        .invitations
        .issue_link(team.id, captain_id)
        .await
        .unwrap();
    app.state
        .invitations
        .accept(&first.token, user_id, Utc::now())
        .await
        .unwrap();

    let second = app
        .state
        .invitations
        .issue_link(team.id, captain_id)
        .await
        .unwrap();
    let err = app
        .state
        .invitations
        .accept(&second.token, user_id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyMember));

    // the failed acceptance rolled everything back
    let unspent = app
        .state
        .invitations
        .find_by_token(&second.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unspent.status, InvitationStatus::Pending);
    assert_eq!(app.state.teams.roster(team.id).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn test_concurrent_accepts_of_one_token_succeed_once() {
    let app = common::TestApp::new().await.unwrap();
    let captain_id = Uuid::new_v4();
    let team = common::create_team(&app, captain_id).await.unwrap();

    let invitation = app
        .state
        .invitations
        .issue_link(team.id, captain_id)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let invitations = app.state.invitations.clone();
        let token = invitation.token.clone();
        handles.push(tokio::spawn(async move {
            invitations.accept(&token, Uuid::new_v4(), Utc::now()).await
        }));
    }

    let results = futures::future::join_all(handles).await;

    let mut successes = 0;
    let mut invalid = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::InvalidToken) => invalid += 1,
            Err(err) => panic!("unexpected error: {}", err),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(invalid, 5);
    assert_eq!(app.state.teams.roster(team.id).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn test_concurrent_accepts_race_for_last_slot() {
    let app = common::TestApp::new().await.unwrap();
    let captain_id = Uuid::new_v4();
    let team = common::create_team(&app, captain_id).await.unwrap();

    // leave exactly one open slot
    for _ in 0..4 {
        let invitation = app
            .state
            .invitations
            .issue_link(team.id, captain_id)
            .await
            .unwrap();
        app.state
            .invitations
            .accept(&invitation.token, Uuid::new_v4(), Utc::now())
            .await
            .unwrap();
    }

    let mut tokens = Vec::new();
    for _ in 0..3 {
        let invitation = app
            .state
            .invitations
            .issue_link(team.id, captain_id)
            .await
            .unwrap();
        tokens.push(invitation.token);
    }

    let mut handles = Vec::new();
    for token in &tokens {
        let invitations = app.state.invitations.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            invitations.accept(&token, Uuid::new_v4(), Utc::now()).await
        }));
    }

    let results = futures::future::join_all(handles).await;

    let mut successes = 0;
    let mut full = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::TeamFull) => full += 1,
            Err(err) => panic!("unexpected error: {}", err),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(full, 2);
    assert_eq!(app.state.teams.roster(team.id).await.unwrap().len(), 6);

    // the losers' tokens survived for a later retry elsewhere
    let mut pending = 0;
    for token in &tokens {
        let invitation = app
            .state
            .invitations
            .find_by_token(token)
            .await
            .unwrap()
            .unwrap();
        if invitation.status == InvitationStatus::Pending {
            pending += 1;
        }
    }
    assert_eq!(pending, 2);
}
