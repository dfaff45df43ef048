//! Who may do what with a survey.

use thiserror::Error;

use crate::domain::entities::SurveyRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewSurveyList,
    CreateSurvey,
    TakeSurvey,
    ManageScales,
    ViewSurveyDetail,
    ChangeSurveyName,
    PublishSurvey,
    DuplicateSurvey,
    EditSurvey,
    ViewResults,
    DeleteObject,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ViewSurveyList => "view_survey_list",
            Permission::CreateSurvey => "create_survey",
            Permission::TakeSurvey => "take_survey",
            Permission::ManageScales => "manage_scales",
            Permission::ViewSurveyDetail => "view_survey_detail",
            Permission::ChangeSurveyName => "change_survey_name",
            Permission::PublishSurvey => "publish_survey",
            Permission::DuplicateSurvey => "duplicate_survey",
            Permission::EditSurvey => "edit_survey",
            Permission::ViewResults => "view_results",
            Permission::DeleteObject => "delete_object",
        }
    }

    /// Permissions that only make sense against a specific survey.
    pub fn needs_target(self) -> bool {
        !matches!(
            self,
            Permission::ViewSurveyList
                | Permission::CreateSurvey
                | Permission::TakeSurvey
                | Permission::ManageScales
        )
    }
}

#[derive(Debug, Error)]
#[error("`{user}` lacks permission `{}`", permission.as_str())]
pub struct PermissionDenied {
    pub user: String,
    pub permission: Permission,
}

pub trait PermissionPolicy: Send + Sync {
    /// `survey` is the survey owning the object being acted on, when there is one.
    fn has_perm(&self, user: &str, permission: Permission, survey: Option<&SurveyRecord>) -> bool;

    fn ensure(
        &self,
        user: &str,
        permission: Permission,
        survey: Option<&SurveyRecord>,
    ) -> Result<(), PermissionDenied> {
        if self.has_perm(user, permission, survey) {
            Ok(())
        } else {
            Err(PermissionDenied {
                user: user.to_string(),
                permission,
            })
        }
    }
}

/// Any authenticated user may create and take surveys; only the creator may
/// see or change a survey's design and results.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatorPolicy;

impl PermissionPolicy for CreatorPolicy {
    fn has_perm(&self, user: &str, permission: Permission, survey: Option<&SurveyRecord>) -> bool {
        if user.is_empty() {
            return false;
        }
        if !permission.needs_target() {
            return true;
        }
        survey.is_some_and(|survey| survey.creator == user)
    }
}
